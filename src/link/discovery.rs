//! Endpoint selection by hardware signature.

use log::warn;
use serde::{Deserialize, Serialize};

use super::transport::EndpointInfo;
use crate::error::TransportError;

/// Known identification of the node's USB serial bridge.  An endpoint
/// matches when any one criterion matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSignature {
    /// Any product from these vendors.
    #[serde(default)]
    pub vendor_ids: Vec<u16>,
    /// Exact vendor/product pairs.
    #[serde(default)]
    pub usb_ids: Vec<(u16, u16)>,
    /// Substrings of the endpoint name (`ttyACM`, `ttyUSB`).
    #[serde(default)]
    pub name_patterns: Vec<String>,
    /// Case-insensitive substrings of the manufacturer/product strings.
    #[serde(default)]
    pub description_keywords: Vec<String>,
}

impl Default for HardwareSignature {
    fn default() -> Self {
        Self {
            vendor_ids: vec![0x2341],
            usb_ids: Vec::new(),
            name_patterns: vec!["ttyACM".into(), "ttyUSB".into()],
            description_keywords: vec!["Arduino".into()],
        }
    }
}

impl HardwareSignature {
    pub fn matches(&self, ep: &EndpointInfo) -> bool {
        if let Some(vid) = ep.vid {
            if self.vendor_ids.contains(&vid) {
                return true;
            }
            if ep.pid.is_some_and(|pid| self.usb_ids.contains(&(vid, pid))) {
                return true;
            }
        }
        if self.name_patterns.iter().any(|p| ep.id.contains(p.as_str())) {
            return true;
        }
        let descriptions = [ep.manufacturer.as_deref(), ep.product.as_deref()];
        self.description_keywords.iter().any(|kw| {
            let kw = kw.to_lowercase();
            descriptions
                .iter()
                .flatten()
                .any(|d| d.to_lowercase().contains(&kw))
        })
    }
}

/// Pick the first enumerated endpoint matching `signature`.
///
/// Deterministic: with several candidates the first one wins and a warning
/// names the rest.
pub fn select<'a>(
    endpoints: &'a [EndpointInfo],
    signature: &HardwareSignature,
) -> Result<&'a EndpointInfo, TransportError> {
    let mut matching = endpoints.iter().filter(|ep| signature.matches(ep));
    let first = matching.next().ok_or(TransportError::NotFound)?;
    let others: Vec<&str> = matching.map(|ep| ep.id.as_str()).collect();
    if !others.is_empty() {
        warn!(
            "link: {} matching endpoints, using {} (ignored: {})",
            others.len() + 1,
            first.id,
            others.join(", ")
        );
    }
    Ok(first)
}
