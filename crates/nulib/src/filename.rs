//! Filename preservation encoding (`spec.md` §6) used when extracting a
//! NuFX record to the host filesystem, and when adding a host file back
//! in: ProDOS/HFS type information and fork markers are folded into the
//! host filename as a suffix so they round-trip through a filesystem
//! that doesn't carry NuFX's own type metadata.

/// Appends a type/creator + fork-marker suffix to `base`, per `spec.md`
/// §6's four encoding rules. `#` in `base` is escaped to `%23` first so
/// the appended `#...` suffix stays unambiguous on the way back in.
pub fn encode_host_name(base: &str, type_info: TypeInfo, fork: ForkMarker) -> String {
    let escaped = base.replace('#', "%23");
    let mut out = escaped;
    match type_info {
        TypeInfo::ProDos { file_type, aux_type } => {
            out.push_str(&format!("#{:02X}{:04X}", file_type, aux_type));
        }
        TypeInfo::Hfs { file_type, creator } => {
            out.push_str(&format!("#{:08X}{:08X}", file_type, creator));
        }
        TypeInfo::None => {}
    }
    match fork {
        ForkMarker::None => {}
        ForkMarker::Resource => out.push('r'),
        ForkMarker::DiskImage => out.push('i'),
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeInfo {
    None,
    ProDos { file_type: u8, aux_type: u16 },
    Hfs { file_type: u32, creator: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkMarker {
    None,
    Resource,
    DiskImage,
}

/// Decoded form of a host filename that may carry an encoded suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    pub stored_name: String,
    pub type_info: TypeInfo,
    pub fork: ForkMarker,
}

/// Reverses `encode_host_name`: strips a trailing fork marker, then a
/// `#...` type suffix (ProDOS 7 hex digits or HFS 16 hex digits), then
/// un-escapes `%23` back to `#`. A name with no recognizable suffix is
/// returned unchanged with `TypeInfo::None`/`ForkMarker::None`.
pub fn decode_host_name(name: &str) -> DecodedName {
    let mut rest = name;
    let mut fork = ForkMarker::None;

    if let Some(stripped) = rest.strip_suffix('r') {
        if has_type_suffix(stripped) {
            rest = stripped;
            fork = ForkMarker::Resource;
        }
    } else if let Some(stripped) = rest.strip_suffix('i') {
        if has_type_suffix(stripped) {
            rest = stripped;
            fork = ForkMarker::DiskImage;
        }
    }

    let (base, type_info) = split_type_suffix(rest);
    DecodedName {
        stored_name: base.replace("%23", "#"),
        type_info,
        fork,
    }
}

fn has_type_suffix(s: &str) -> bool {
    !matches!(split_type_suffix(s).1, TypeInfo::None)
}

fn split_type_suffix(s: &str) -> (&str, TypeInfo) {
    let Some(hash_pos) = s.rfind('#') else {
        return (s, TypeInfo::None);
    };
    let suffix = &s[hash_pos + 1..];
    let base = &s[..hash_pos];

    if suffix.len() == 6 && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        if let (Ok(file_type), Ok(aux_type)) = (
            u8::from_str_radix(&suffix[0..2], 16),
            u16::from_str_radix(&suffix[2..6], 16),
        ) {
            return (base, TypeInfo::ProDos { file_type, aux_type });
        }
    }

    if suffix.len() == 16 && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
        if let (Ok(file_type), Ok(creator)) = (
            u32::from_str_radix(&suffix[0..8], 16),
            u32::from_str_radix(&suffix[8..16], 16),
        ) {
            return (base, TypeInfo::Hfs { file_type, creator });
        }
    }

    (s, TypeInfo::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prodos_suffix_roundtrips() {
        let encoded = encode_host_name("HELLO", TypeInfo::ProDos { file_type: 0x04, aux_type: 0x0000 }, ForkMarker::None);
        assert_eq!(encoded, "HELLO#040000");
        let decoded = decode_host_name(&encoded);
        assert_eq!(decoded.stored_name, "HELLO");
        assert_eq!(decoded.type_info, TypeInfo::ProDos { file_type: 0x04, aux_type: 0x0000 });
    }

    #[test]
    fn hfs_suffix_with_resource_marker_roundtrips() {
        let encoded = encode_host_name(
            "Icon",
            TypeInfo::Hfs {
                file_type: 0x54455854,
                creator: 0x74746578,
            },
            ForkMarker::Resource,
        );
        assert_eq!(encoded, "Icon#5445585474746578r");
        let decoded = decode_host_name(&encoded);
        assert_eq!(decoded.fork, ForkMarker::Resource);
        assert_eq!(decoded.stored_name, "Icon");
    }

    #[test]
    fn leading_hash_is_escaped_and_unescaped() {
        let encoded = encode_host_name("#config", TypeInfo::None, ForkMarker::None);
        assert_eq!(encoded, "%23config");
        let decoded = decode_host_name(&encoded);
        assert_eq!(decoded.stored_name, "#config");
    }

    #[test]
    fn name_with_no_suffix_is_unchanged() {
        let decoded = decode_host_name("PLAIN.TXT");
        assert_eq!(decoded.stored_name, "PLAIN.TXT");
        assert_eq!(decoded.type_info, TypeInfo::None);
        assert_eq!(decoded.fork, ForkMarker::None);
    }
}
