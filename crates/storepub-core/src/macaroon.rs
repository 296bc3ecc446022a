//! Macaroon v1 binary codec.
//!
//! Root and discharge tokens travel as base64url-encoded v1 packets:
//!
//! ```text
//! HHHHlocation <loc>\n
//! HHHHidentifier <id>\n
//! HHHHcid <caveat id>\n        (repeated per caveat)
//! HHHHvid <verification id>\n  (third-party caveats only)
//! HHHHcl <caveat location>\n   (third-party caveats only)
//! HHHHsignature <32 raw bytes>\n
//! ```
//!
//! `HHHH` is the total packet length in lowercase hex, header and newline
//! included.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PublishError, PublishResult};

type HmacSha256 = Hmac<Sha256>;

const PACKET_PREFIX_LEN: usize = 4;
const MAX_PACKET_LEN: usize = 0xffff;
const SIGNATURE_LEN: usize = 32;
const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

/// One caveat. Third-party caveats carry a verification id and a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caveat {
    pub caveat_id: Vec<u8>,
    pub verification_id: Option<Vec<u8>>,
    pub location: Option<String>,
}

impl Caveat {
    pub fn is_third_party(&self) -> bool {
        self.verification_id.is_some()
    }
}

/// Decoded macaroon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    location: String,
    identifier: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: [u8; SIGNATURE_LEN],
}

impl Macaroon {
    /// Mint a new macaroon from a root key.
    pub fn mint(location: impl Into<String>, identifier: impl Into<Vec<u8>>, key: &[u8]) -> Self {
        let identifier = identifier.into();
        let derived = hmac(&pad_key(KEY_GENERATOR), key);
        let signature = hmac(&derived, &identifier);
        Self {
            location: location.into(),
            identifier,
            caveats: Vec::new(),
            signature,
        }
    }

    pub fn add_first_party_caveat(mut self, predicate: impl Into<Vec<u8>>) -> Self {
        let caveat_id = predicate.into();
        self.signature = hmac(&self.signature, &caveat_id);
        self.caveats.push(Caveat {
            caveat_id,
            verification_id: None,
            location: None,
        });
        self
    }

    /// Append a third-party caveat with an already-sealed verification id.
    pub fn add_third_party_caveat(
        mut self,
        location: impl Into<String>,
        caveat_id: impl Into<Vec<u8>>,
        verification_id: impl Into<Vec<u8>>,
    ) -> Self {
        let caveat_id = caveat_id.into();
        let verification_id = verification_id.into();
        self.signature = hash_pair(&self.signature, &verification_id, &caveat_id);
        self.caveats.push(Caveat {
            caveat_id,
            verification_id: Some(verification_id),
            location: Some(location.into()),
        });
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    pub fn third_party_caveats(&self) -> impl Iterator<Item = &Caveat> {
        self.caveats.iter().filter(|c| c.is_third_party())
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    /// Copy of `discharge` whose signature is bound to this (root) macaroon.
    pub fn bind_discharge(&self, discharge: &Macaroon) -> Macaroon {
        let zero = [0u8; SIGNATURE_LEN];
        let mut bound = discharge.clone();
        bound.signature = hash_pair(&zero, &self.signature, &discharge.signature);
        bound
    }

    /// Serialize to base64url without padding.
    pub fn serialize(&self) -> String {
        let mut out = Vec::new();
        write_packet(&mut out, "location", self.location.as_bytes());
        write_packet(&mut out, "identifier", &self.identifier);
        for caveat in &self.caveats {
            write_packet(&mut out, "cid", &caveat.caveat_id);
            if let Some(vid) = &caveat.verification_id {
                write_packet(&mut out, "vid", vid);
            }
            if let Some(cl) = &caveat.location {
                write_packet(&mut out, "cl", cl.as_bytes());
            }
        }
        write_packet(&mut out, "signature", &self.signature);
        URL_SAFE_NO_PAD.encode(out)
    }

    /// Parse a serialized macaroon (base64url or standard, padded or not).
    pub fn deserialize(serialized: &str) -> PublishResult<Self> {
        let trimmed = serialized.trim().trim_end_matches('=');
        let raw = URL_SAFE_NO_PAD
            .decode(trimmed)
            .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
            .map_err(|e| invalid(format!("not valid base64: {}", e)))?;

        let mut location = None;
        let mut identifier = None;
        let mut caveats: Vec<Caveat> = Vec::new();
        let mut signature = None;

        let mut rest = raw.as_slice();
        while !rest.is_empty() {
            let (key, value, tail) = read_packet(rest)?;
            rest = tail;

            if signature.is_some() {
                return Err(invalid("data after signature packet".to_string()));
            }

            match key {
                b"location" => location = Some(utf8(value, "location")?),
                b"identifier" => identifier = Some(value.to_vec()),
                b"cid" => caveats.push(Caveat {
                    caveat_id: value.to_vec(),
                    verification_id: None,
                    location: None,
                }),
                b"vid" => {
                    let caveat = caveats
                        .last_mut()
                        .ok_or_else(|| invalid("vid packet before any cid".to_string()))?;
                    caveat.verification_id = Some(value.to_vec());
                }
                b"cl" => {
                    let caveat = caveats
                        .last_mut()
                        .ok_or_else(|| invalid("cl packet before any cid".to_string()))?;
                    caveat.location = Some(utf8(value, "cl")?);
                }
                b"signature" => {
                    let sig: [u8; SIGNATURE_LEN] = value.try_into().map_err(|_| {
                        invalid(format!(
                            "signature must be {} bytes, got {}",
                            SIGNATURE_LEN,
                            value.len()
                        ))
                    })?;
                    signature = Some(sig);
                }
                other => {
                    return Err(invalid(format!(
                        "unexpected packet key {:?}",
                        String::from_utf8_lossy(other)
                    )))
                }
            }
        }

        Ok(Self {
            location: location.ok_or_else(|| invalid("missing location".to_string()))?,
            identifier: identifier.ok_or_else(|| invalid("missing identifier".to_string()))?,
            caveats,
            signature: signature.ok_or_else(|| invalid("missing signature".to_string()))?,
        })
    }
}

fn invalid(message: String) -> PublishError {
    PublishError::InvalidToken { message }
}

fn utf8(value: &[u8], field: &str) -> PublishResult<String> {
    String::from_utf8(value.to_vec()).map_err(|_| invalid(format!("{} is not UTF-8", field)))
}

fn write_packet(out: &mut Vec<u8>, key: &str, value: &[u8]) {
    let len = PACKET_PREFIX_LEN + key.len() + 1 + value.len() + 1;
    out.extend_from_slice(format!("{:04x}", len).as_bytes());
    out.extend_from_slice(key.as_bytes());
    out.push(b' ');
    out.extend_from_slice(value);
    out.push(b'\n');
}

fn read_packet(data: &[u8]) -> PublishResult<(&[u8], &[u8], &[u8])> {
    if data.len() < PACKET_PREFIX_LEN {
        return Err(invalid("truncated packet header".to_string()));
    }
    let header = std::str::from_utf8(&data[..PACKET_PREFIX_LEN])
        .ok()
        .and_then(|h| usize::from_str_radix(h, 16).ok())
        .ok_or_else(|| invalid("packet header is not hex".to_string()))?;

    if header <= PACKET_PREFIX_LEN + 1 || header > MAX_PACKET_LEN || header > data.len() {
        return Err(invalid(format!("bad packet length {}", header)));
    }

    let (packet, tail) = data.split_at(header);
    let body = &packet[PACKET_PREFIX_LEN..];
    let body = body
        .strip_suffix(b"\n")
        .ok_or_else(|| invalid("packet missing trailing newline".to_string()))?;
    let space = body
        .iter()
        .position(|b| *b == b' ')
        .ok_or_else(|| invalid("packet missing key separator".to_string()))?;

    Ok((&body[..space], &body[space + 1..], tail))
}

fn pad_key(key: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut padded = [0u8; SIGNATURE_LEN];
    let n = key.len().min(SIGNATURE_LEN);
    padded[..n].copy_from_slice(&key[..n]);
    padded
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    let mut out = [0u8; SIGNATURE_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn hash_pair(key: &[u8], a: &[u8], b: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut joined = Vec::with_capacity(SIGNATURE_LEN * 2);
    joined.extend_from_slice(&hmac(key, a));
    joined.extend_from_slice(&hmac(key, b));
    hmac(key, &joined)
}
