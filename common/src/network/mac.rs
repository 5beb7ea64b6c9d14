use std::sync::OnceLock;

use mac_oui::Oui;
use pnet::util::MacAddr;

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

/// Retrieves or initializes the **Organizationally unique identifier** database.
///
/// Only used to label responders that are not a supported device.
fn get_oui_db() -> Option<&'static Oui> {
    OUI_DB.get_or_init(|| Oui::default().ok()).as_ref()
}

/// Identify the registered vendor of any MAC address.
pub fn vendor_name(mac: MacAddr) -> Option<String> {
    let db = get_oui_db()?;
    match db.lookup_by_mac(&mac.to_string()) {
        Ok(Some(entry)) => Some(entry.company_name.clone()),
        _ => None,
    }
}

/// Parses `c0:74:ad:11:22:33`, `C0-74-AD-11-22-33` or `c074ad112233`.
///
/// Octets may be a single hex digit when separated, as BSD `arp` prints them.
pub fn parse_mac(raw: &str) -> Option<MacAddr> {
    let raw = raw.trim();
    let octets: Vec<u8> = if raw.contains([':', '-']) {
        raw.split([':', '-'])
            .map(|part| match part.len() {
                1 | 2 => u8::from_str_radix(part, 16).ok(),
                _ => None,
            })
            .collect::<Option<Vec<u8>>>()?
    } else {
        if raw.len() != 12 || !raw.is_ascii() {
            return None;
        }
        (0..12)
            .step_by(2)
            .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).ok())
            .collect::<Option<Vec<u8>>>()?
    };

    match octets.as_slice() {
        &[a, b, c, d, e, f] => Some(MacAddr::new(a, b, c, d, e, f)),
        _ => None,
    }
}

/// A vendor's registered MAC prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorSignature {
    pub vendor: &'static str,
    pub oui: [u8; 3],
}

pub const GRANDSTREAM: VendorSignature = VendorSignature::new("Grandstream", [0xC0, 0x74, 0xAD]);

impl VendorSignature {
    pub const fn new(vendor: &'static str, oui: [u8; 3]) -> Self {
        Self { vendor, oui }
    }

    pub fn matches(&self, mac: MacAddr) -> bool {
        [mac.0, mac.1, mac.2] == self.oui
    }
}

/// The set of hardware signatures a scan accepts as the target device.
#[derive(Debug, Clone)]
pub struct VendorRegistry {
    signatures: Vec<VendorSignature>,
}

impl Default for VendorRegistry {
    fn default() -> Self {
        Self::new(vec![GRANDSTREAM])
    }
}

impl VendorRegistry {
    pub fn new(signatures: Vec<VendorSignature>) -> Self {
        Self { signatures }
    }

    pub fn register(&mut self, signature: VendorSignature) {
        self.signatures.push(signature);
    }

    pub fn identify(&self, mac: MacAddr) -> Option<&VendorSignature> {
        self.signatures.iter().find(|sig| sig.matches(mac))
    }

    /// Same as [`identify`](Self::identify) but accepts the textual forms `arp` prints.
    pub fn identify_str(&self, raw: &str) -> Option<&VendorSignature> {
        parse_mac(raw).and_then(|mac| self.identify(mac))
    }

    pub fn signatures(&self) -> &[VendorSignature] {
        &self.signatures
    }
}
