//! Access control lists
//!
//! An ACL entry is a `(scheme, id, permissions)` triple. This module parses
//! the two string forms accepted on the command line:
//!
//! - permission strings: `"cdrwa"` letters, or a numeric bitmask such as `"31"`
//! - ACL specs: comma-separated `scheme:id:perms` entries, where digest entries
//!   carry a colon inside the id (`digest:user:hash:perms`)
//!
//! and renders ACLs back as `scheme:id:cdrwa`.

use crate::error::{Result, ZkError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bitflags::bitflags;
use sha1::{Digest, Sha1};
use std::fmt;

bitflags! {
    /// Permission bits, with the service's wire values
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Perms: u8 {
        const READ = 1;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
        const DELETE = 1 << 3;
        const ADMIN = 1 << 4;
        const ALL = Self::READ.bits()
            | Self::WRITE.bits()
            | Self::CREATE.bits()
            | Self::DELETE.bits()
            | Self::ADMIN.bits();
    }
}

/// Rendering order of permission letters
const LETTERS: [(Perms, char); 5] = [
    (Perms::CREATE, 'c'),
    (Perms::DELETE, 'd'),
    (Perms::READ, 'r'),
    (Perms::WRITE, 'w'),
    (Perms::ADMIN, 'a'),
];

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (perm, letter) in LETTERS {
            if self.contains(perm) {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

/// One ACL entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Acl {
    pub scheme: String,
    pub id: String,
    pub perms: Perms,
}

impl Acl {
    pub fn new(scheme: impl Into<String>, id: impl Into<String>, perms: Perms) -> Self {
        Self {
            scheme: scheme.into(),
            id: id.into(),
            perms,
        }
    }

    /// `world:anyone` with every permission
    pub fn world_all() -> Self {
        Self::new("world", "anyone", Perms::ALL)
    }

    /// Digest entry for a user/password pair
    pub fn digest(user: &str, password: &str, perms: Perms) -> Self {
        Self::new("digest", digest_id(user, password), perms)
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scheme, self.id, self.perms)
    }
}

/// The ACL applied when the caller gives none
pub fn default_acl() -> Vec<Acl> {
    vec![Acl::world_all()]
}

/// Identity the digest scheme derives from `user:password`:
/// `user:base64(sha1("user:password"))`.
pub fn digest_id(user: &str, password: &str) -> String {
    let hash = Sha1::digest(format!("{}:{}", user, password).as_bytes());
    format!("{}:{}", user, STANDARD.encode(hash))
}

/// Parse a permission string.
///
/// A number is taken as a raw bitmask and clamped into the valid range;
/// anything else must be made of the letters `r w c d a`.
pub fn parse_perms(s: &str) -> Result<Perms> {
    let s = s.trim();
    if let Ok(value) = s.parse::<f64>() {
        if value.is_finite() {
            let bits = value.clamp(0.0, Perms::ALL.bits() as f64) as u8;
            return Ok(Perms::from_bits_truncate(bits));
        }
    }

    let mut perms = Perms::empty();
    for c in s.chars() {
        perms |= match c {
            'r' => Perms::READ,
            'w' => Perms::WRITE,
            'c' => Perms::CREATE,
            'd' => Perms::DELETE,
            'a' => Perms::ADMIN,
            other => {
                return Err(ZkError::InvalidAcl(format!(
                    "invalid permission '{}' in {:?}",
                    other, s
                )))
            }
        };
    }
    Ok(perms)
}

/// Parse an ACL spec such as `world:anyone:r,digest:bob:Xyz=:cdrwa`.
pub fn parse_acl_spec(spec: &str) -> Result<Vec<Acl>> {
    spec.split(',').map(parse_acl_entry).collect()
}

fn parse_acl_entry(entry: &str) -> Result<Acl> {
    let entry = entry.trim();
    let parts: Vec<&str> = entry.split(':').collect();

    if parts.len() > 3 && parts[0] == "digest" {
        let perms = parse_perms(parts[3])?;
        return Ok(Acl::new(parts[0], format!("{}:{}", parts[1], parts[2]), perms));
    }
    if parts.len() < 3 {
        return Err(ZkError::InvalidAcl(format!(
            "expected scheme:id:perms, got {:?}",
            entry
        )));
    }
    let perms = parse_perms(parts[2])?;
    Ok(Acl::new(parts[0], parts[1], perms))
}

/// Build digest ACL entries for `user`/`password`, one per numeric bitmask
/// in the comma-separated `perms_list` (e.g. `"31"` or `"1,31"`).
pub fn build_digest_acl(user: &str, password: &str, perms_list: &str) -> Result<Vec<Acl>> {
    perms_list
        .split(',')
        .map(|elem| {
            let bits: i64 = elem.trim().parse().map_err(|_| {
                ZkError::InvalidAcl(format!("expected numeric permission, got {:?}", elem))
            })?;
            let bits = bits.clamp(0, Perms::ALL.bits() as i64) as u8;
            Ok(Acl::digest(user, password, Perms::from_bits_truncate(bits)))
        })
        .collect()
}

/// Render ACL entries as `scheme:id:cdrwa` strings.
pub fn format_acls(acls: &[Acl]) -> Vec<String> {
    acls.iter().map(Acl::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_perm_letters() {
        assert_eq!(parse_perms("r").unwrap(), Perms::READ);
        assert_eq!(parse_perms("rw").unwrap(), Perms::READ | Perms::WRITE);
        assert_eq!(parse_perms("cdrwa").unwrap(), Perms::ALL);
        assert_eq!(parse_perms("awrdc").unwrap(), Perms::ALL);
        assert_eq!(parse_perms("").unwrap(), Perms::empty());
    }

    #[test]
    fn test_parse_perm_numbers() {
        assert_eq!(parse_perms("31").unwrap(), Perms::ALL);
        assert_eq!(parse_perms("1").unwrap(), Perms::READ);
        assert_eq!(parse_perms("3").unwrap(), Perms::READ | Perms::WRITE);
        assert_eq!(parse_perms("100").unwrap(), Perms::ALL);
        assert_eq!(parse_perms("-4").unwrap(), Perms::empty());
        assert_eq!(parse_perms("5.9").unwrap(), Perms::READ | Perms::CREATE);
    }

    #[test]
    fn test_parse_perm_invalid() {
        assert!(matches!(parse_perms("rx"), Err(ZkError::InvalidAcl(_))));
        assert!(parse_perms("inf").is_err());
    }

    #[test]
    fn test_parse_acl_spec() {
        let acls = parse_acl_spec("world:anyone:r,ip:10.0.0.1:cdrwa").unwrap();
        assert_eq!(
            acls,
            vec![
                Acl::new("world", "anyone", Perms::READ),
                Acl::new("ip", "10.0.0.1", Perms::ALL),
            ]
        );
    }

    #[test]
    fn test_parse_digest_spec() {
        let acls = parse_acl_spec("digest:bob:c2VjcmV0:rw").unwrap();
        assert_eq!(acls.len(), 1);
        assert_eq!(acls[0].scheme, "digest");
        assert_eq!(acls[0].id, "bob:c2VjcmV0");
        assert_eq!(acls[0].perms, Perms::READ | Perms::WRITE);
    }

    #[test]
    fn test_parse_acl_spec_errors() {
        assert!(parse_acl_spec("world:anyone").is_err());
        assert!(parse_acl_spec("").is_err());
        assert!(parse_acl_spec("world:anyone:r,world:anyone:z").is_err());
    }

    #[test]
    fn test_digest_id() {
        assert_eq!(digest_id("super", "admin"), "super:xQJmxLMiHGwaqBvst5y6rkB6HQs=");
    }

    #[test]
    fn test_build_digest_acl() {
        let acls = build_digest_acl("super", "admin", "31,1").unwrap();
        assert_eq!(acls.len(), 2);
        assert_eq!(acls[0].to_string(), "digest:super:xQJmxLMiHGwaqBvst5y6rkB6HQs=:cdrwa");
        assert_eq!(acls[1].perms, Perms::READ);
        assert!(build_digest_acl("u", "p", "31,rw").is_err());
    }

    #[test]
    fn test_format_order() {
        let acl = Acl::new("world", "anyone", Perms::ADMIN | Perms::READ | Perms::CREATE);
        assert_eq!(acl.to_string(), "world:anyone:cra");
        assert_eq!(
            format_acls(&default_acl()),
            vec!["world:anyone:cdrwa".to_string()]
        );
    }
}
