//! Key-system negotiation for protected presentations.
//!
//! The player only picks a key system from the manifest's flavor map and shapes the
//! initialization data handed to it. License exchange belongs to the host.

use mp4_box::boxes::generic::Mp4Box;
use mp4_box::boxes::pssh::PsshBox;
use mp4_box::{read_array16, read_bytes, read_fourcc, read_u32_be};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PlayerError, Result};
use crate::manifest::{ProtectionInfo, ProtectionMap};

pub const CLEAR_KEY_SYSTEM_ID: Uuid = Uuid::from_u128(0x58147ec8_0423_4659_92e6_f52c5ce8c3cc);
pub const WIDEVINE_SYSTEM_ID: Uuid = Uuid::from_u128(0xedef8ba9_79d6_4ace_a3c8_27dcd51d21ed);

const FLAVOR_KEY_SYSTEMS: &[(&str, &[&str])] = &[
    ("clearkey", &["webkit-org.w3.clearkey", "org.w3.clearkey"]),
    ("widevine", &["com.widevine.alpha"]),
    ("playready", &["com.youtube.playready", "com.microsoft.playready"]),
];

// Initialization data of exactly this size is a bare key id rather than pssh boxes.
const BARE_KEY_ID_LEN: usize = 16;

/// Key systems that can serve `flavor`, in preference order.
pub fn flavor_key_systems(flavor: &str) -> Option<&'static [&'static str]> {
    FLAVOR_KEY_SYSTEMS
        .iter()
        .find(|(name, _)| *name == flavor)
        .map(|(_, systems)| *systems)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySystemChoice {
    pub flavor: String,
    pub key_system: String,
    pub license_url: String,
}

impl KeySystemChoice {
    pub fn is_clear_key(&self) -> bool {
        self.flavor == "clearkey"
    }
}

/// Walks the flavor map in manifest order and returns the first key system the host supports.
///
/// With `preferred` set, other flavors are skipped.
pub fn choose_key_system(
    protection: &ProtectionMap,
    preferred: Option<&str>,
    is_supported: impl Fn(&str) -> bool,
) -> Result<KeySystemChoice> {
    for (flavor, license_url) in protection {
        if preferred.is_some_and(|p| p != flavor.as_str()) {
            continue;
        }
        let Some(systems) = flavor_key_systems(flavor) else {
            debug!("unknown protection flavor '{}'", flavor);
            continue;
        };
        if let Some(system) = systems.iter().find(|s| is_supported(s)) {
            return Ok(KeySystemChoice {
                flavor: flavor.clone(),
                key_system: system.to_string(),
                license_url: license_url.clone(),
            });
        }
    }
    Err(PlayerError::unsupported("could not find a compatible key system"))
}

/// Pulls the 16-byte key id out of Clear Key or Widevine `pssh` boxes.
///
/// Returns `init_data` unchanged when neither system is present.
pub fn extract_clear_key_id(init_data: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;
    while pos < init_data.len() {
        let box_size = read_u32_be(init_data, pos)? as usize;
        let box_type = read_fourcc(init_data, pos + 4)?;
        if &box_type != b"pssh" {
            return Err(PlayerError::MalformedContainer(format!(
                "box type {} not equal to \"pssh\"",
                mp4_box::format_fourcc(&box_type)
            )));
        }
        if box_size < 8 {
            return Err(PlayerError::MalformedContainer(format!("pssh box size {}", box_size)));
        }

        let system_id = Uuid::from_bytes(read_array16(init_data, pos + 12)?);
        if system_id == CLEAR_KEY_SYSTEM_ID {
            let size = read_u32_be(init_data, pos + 28)? as usize;
            if size != 16 {
                return Err(PlayerError::MalformedContainer(format!("unexpected KID size {}", size)));
            }
            return Ok(read_bytes(init_data, pos + 32, size)?.to_vec());
        }
        if system_id == WIDEVINE_SYSTEM_ID {
            return Ok(read_bytes(init_data, pos + 36, 16)?.to_vec());
        }
        pos += box_size;
    }
    Ok(init_data.to_vec())
}

/// Initialization data to hand to the key system, or `None` when the event should be dropped.
pub fn prepare_key_request(choice: &KeySystemChoice, init_data: &[u8]) -> Result<Option<Vec<u8>>> {
    if init_data.len() == BARE_KEY_ID_LEN {
        warn!("dropping non-BMFF key request");
        return Ok(None);
    }
    if choice.is_clear_key() {
        return extract_clear_key_id(init_data).map(Some);
    }
    Ok(Some(init_data.to_vec()))
}

/// The `pssh` box advertised by a fragment-list manifest's protection header.
pub fn protection_init_data(protection: &ProtectionInfo) -> Vec<u8> {
    let pssh = PsshBox::new(protection.system_id, protection.header.clone());
    let mut data = Vec::with_capacity(pssh.box_size() as usize);
    pssh.write_box(&mut data);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pssh(system_id: Uuid, data: &[u8]) -> Vec<u8> {
        let mut buffer = Vec::new();
        PsshBox::new(*system_id.as_bytes(), data.to_vec()).write_box(&mut buffer);
        buffer
    }

    fn map(entries: &[(&str, &str)]) -> ProtectionMap {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn first_supported_flavor_wins() {
        let protection = map(&[("widevine", "https://wv"), ("clearkey", "https://ck")]);
        let choice = choose_key_system(&protection, None, |s| s == "org.w3.clearkey").unwrap();
        assert_eq!(choice.flavor, "clearkey");
        assert_eq!(choice.key_system, "org.w3.clearkey");
        assert_eq!(choice.license_url, "https://ck");

        let choice = choose_key_system(&protection, None, |_| true).unwrap();
        assert_eq!(choice.key_system, "com.widevine.alpha");
    }

    #[test]
    fn preferred_flavor_filters_and_none_supported_fails() {
        let protection = map(&[("widevine", "https://wv"), ("playready", "https://pr")]);
        let choice = choose_key_system(&protection, Some("playready"), |_| true).unwrap();
        assert_eq!(choice.key_system, "com.youtube.playready");

        assert!(matches!(
            choose_key_system(&protection, Some("clearkey"), |_| true),
            Err(PlayerError::UnsupportedFeature(_))
        ));
        assert!(choose_key_system(&protection, None, |_| false).is_err());
    }

    #[test]
    fn key_id_from_clear_key_and_widevine_boxes() {
        let kid: Vec<u8> = (1..=16).collect();

        let other = pssh(Uuid::from_u128(1), &[9, 9]);
        let mut init = other.clone();
        init.extend(pssh(CLEAR_KEY_SYSTEM_ID, &kid));
        assert_eq!(extract_clear_key_id(&init).unwrap(), kid);

        // Widevine protobuf: 4 bytes of field header ahead of the key id
        let mut widevine_data = vec![0x08, 0x01, 0x12, 0x10];
        widevine_data.extend_from_slice(&kid);
        assert_eq!(extract_clear_key_id(&pssh(WIDEVINE_SYSTEM_ID, &widevine_data)).unwrap(), kid);

        assert_eq!(extract_clear_key_id(&other).unwrap(), other);
    }

    #[test]
    fn malformed_init_data() {
        assert!(extract_clear_key_id(&pssh(CLEAR_KEY_SYSTEM_ID, &[0; 8])).is_err());

        let mut not_pssh = pssh(Uuid::from_u128(1), &[]);
        not_pssh[4..8].copy_from_slice(b"moov");
        assert!(matches!(extract_clear_key_id(&not_pssh), Err(PlayerError::MalformedContainer(_))));
    }

    #[test]
    fn bare_key_ids_are_dropped() {
        let choice = KeySystemChoice {
            flavor: "widevine".to_string(),
            key_system: "com.widevine.alpha".to_string(),
            license_url: String::new(),
        };
        assert_eq!(prepare_key_request(&choice, &[0; 16]).unwrap(), None);
        let init = pssh(WIDEVINE_SYSTEM_ID, &[0; 20]);
        assert_eq!(prepare_key_request(&choice, &init).unwrap(), Some(init));
    }
}
