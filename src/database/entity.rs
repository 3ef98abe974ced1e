//! Values stored under keys

use bytes::Bytes;

use crate::datastruct::{LinkedList, SortedSet};
use crate::error::ReplyError;
use crate::protocol::CmdLine;

/// One value in a keyspace
#[derive(Debug, Clone)]
pub enum DataEntity {
    Bytes(Bytes),
    List(LinkedList<Bytes>),
    SortedSet(SortedSet),
}

impl DataEntity {
    /// Name reported by `TYPE`
    pub fn type_name(&self) -> &'static str {
        match self {
            DataEntity::Bytes(_) => "string",
            DataEntity::List(_) => "list",
            DataEntity::SortedSet(_) => "zset",
        }
    }

    pub fn as_bytes(&self) -> Result<&Bytes, ReplyError> {
        match self {
            DataEntity::Bytes(value) => Ok(value),
            _ => Err(ReplyError::WrongType),
        }
    }

    pub fn as_list(&self) -> Result<&LinkedList<Bytes>, ReplyError> {
        match self {
            DataEntity::List(list) => Ok(list),
            _ => Err(ReplyError::WrongType),
        }
    }

    pub fn as_list_mut(&mut self) -> Result<&mut LinkedList<Bytes>, ReplyError> {
        match self {
            DataEntity::List(list) => Ok(list),
            _ => Err(ReplyError::WrongType),
        }
    }

    pub fn as_zset(&self) -> Result<&SortedSet, ReplyError> {
        match self {
            DataEntity::SortedSet(set) => Ok(set),
            _ => Err(ReplyError::WrongType),
        }
    }

    pub fn as_zset_mut(&mut self) -> Result<&mut SortedSet, ReplyError> {
        match self {
            DataEntity::SortedSet(set) => Ok(set),
            _ => Err(ReplyError::WrongType),
        }
    }

    /// Containers with no elements left. Strings are never empty in this sense.
    pub fn is_empty(&self) -> bool {
        match self {
            DataEntity::Bytes(_) => false,
            DataEntity::List(list) => list.is_empty(),
            DataEntity::SortedSet(set) => set.is_empty(),
        }
    }

    /// A command that recreates this value under `key`
    pub fn to_cmd_line(&self, key: &[u8]) -> CmdLine {
        let mut line = Vec::new();
        match self {
            DataEntity::Bytes(value) => {
                line.push(Bytes::from_static(b"SET"));
                line.push(Bytes::copy_from_slice(key));
                line.push(value.clone());
            }
            DataEntity::List(list) => {
                line.reserve(list.len() + 2);
                line.push(Bytes::from_static(b"RPUSH"));
                line.push(Bytes::copy_from_slice(key));
                line.extend(list.iter().cloned());
            }
            DataEntity::SortedSet(set) => {
                line.reserve(set.len() * 2 + 2);
                line.push(Bytes::from_static(b"ZADD"));
                line.push(Bytes::copy_from_slice(key));
                for element in set.iter() {
                    line.push(Bytes::from(element.score.to_string()));
                    line.push(element.member.clone());
                }
            }
        }
        line
    }
}
