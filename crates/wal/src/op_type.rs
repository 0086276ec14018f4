//! WAL operation kinds.

use entity_core::error::{Error, Result};

/// The kind of mutation a WAL entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Create = 1,
    Update = 2,
    Delete = 3,
    Checkpoint = 4,
}

impl OpType {
    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(OpType::Create),
            2 => Ok(OpType::Update),
            3 => Ok(OpType::Delete),
            4 => Ok(OpType::Checkpoint),
            other => Err(Error::Corruption(format!("unknown WAL op type {other}"))),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_all_known_kinds() {
        for kind in [OpType::Create, OpType::Update, OpType::Delete, OpType::Checkpoint] {
            assert_eq!(OpType::from_u8(kind.as_u8()).unwrap(), kind);
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(OpType::from_u8(0).is_err());
        assert!(OpType::from_u8(5).is_err());
    }
}
