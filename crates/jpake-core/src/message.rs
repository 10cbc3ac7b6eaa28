//! JSON wire messages exchanged through the rendezvous channel.
//!
//! Every message is `{ "type": "<role><round>", "version": 3, "payload": {..} }`.
//! Integers travel as even-length hex, ciphertext and IV as base64.

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use jpake_crypto::{
    bigint::{from_hex, to_even_length_hex},
    payload::EncryptedPayload,
    JPakeParty, Zkp,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PairingError;

pub const PROTOCOL_VERSION: u32 = 3;

/// Which end of the exchange a party plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Enters the PIN and sends credentials.
    Sender,
    /// Displays the PIN and receives credentials.
    Receiver,
}

impl Role {
    /// Signer id bound into this role's proofs.
    pub fn signer_id(&self) -> &'static str {
        match self {
            Role::Sender => "sender",
            Role::Receiver => "receiver",
        }
    }

    pub fn peer(&self) -> Role {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }

    pub fn message_type(&self, round: u8) -> String {
        format!("{}{}", self.signer_id(), round)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub payload: Value,
}

impl WireMessage {
    pub fn new<T: Serialize>(role: Role, round: u8, payload: &T) -> Result<Self, PairingError> {
        Ok(Self {
            kind: role.message_type(round),
            version: PROTOCOL_VERSION,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Decode a body read from the channel, insisting on the peer's `round` message.
    pub fn decode(body: Value, from: Role, round: u8) -> Result<Self, PairingError> {
        let msg: WireMessage = serde_json::from_value(body)?;
        let expected = from.message_type(round);
        if msg.kind != expected {
            return Err(PairingError::WrongMessage(format!(
                "expected {expected}, got {}",
                msg.kind
            )));
        }
        if msg.version != PROTOCOL_VERSION {
            return Err(PairingError::WrongMessage(format!(
                "unsupported version {}",
                msg.version
            )));
        }
        Ok(msg)
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, PairingError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn to_value(&self) -> Result<Value, PairingError> {
        Ok(serde_json::to_value(self)?)
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkpPayload {
    pub gr: String,
    pub b: String,
    pub id: String,
}

impl From<&Zkp> for ZkpPayload {
    fn from(zkp: &Zkp) -> Self {
        Self {
            gr: to_even_length_hex(&zkp.gr),
            b: to_even_length_hex(&zkp.b),
            id: zkp.id.clone(),
        }
    }
}

impl TryFrom<&ZkpPayload> for Zkp {
    type Error = PairingError;

    fn try_from(p: &ZkpPayload) -> Result<Self, Self::Error> {
        Ok(Zkp {
            gr: from_hex(&p.gr)?,
            b: from_hex(&p.b)?,
            id: p.id.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round1Payload {
    pub gx1: String,
    pub gx2: String,
    pub zkp_x1: ZkpPayload,
    pub zkp_x2: ZkpPayload,
}

impl Round1Payload {
    pub fn from_party(party: &JPakeParty) -> Result<Self, PairingError> {
        let missing = || PairingError::InvalidState("round 1 not computed".into());
        Ok(Self {
            gx1: to_even_length_hex(party.gx1.as_ref().ok_or_else(missing)?),
            gx2: to_even_length_hex(party.gx2.as_ref().ok_or_else(missing)?),
            zkp_x1: party.zkp1.as_ref().ok_or_else(missing)?.into(),
            zkp_x2: party.zkp2.as_ref().ok_or_else(missing)?.into(),
        })
    }

    /// Store the peer's round-1 values as `gx3`, `gx4`, `zkp3`, `zkp4`.
    pub fn apply_to(&self, party: &mut JPakeParty) -> Result<(), PairingError> {
        party.gx3 = Some(from_hex(&self.gx1)?);
        party.gx4 = Some(from_hex(&self.gx2)?);
        party.zkp3 = Some(Zkp::try_from(&self.zkp_x1)?);
        party.zkp4 = Some(Zkp::try_from(&self.zkp_x2)?);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round2Payload {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "zkp_A")]
    pub zkp_a: ZkpPayload,
}

impl Round2Payload {
    pub fn from_party(party: &JPakeParty) -> Result<Self, PairingError> {
        let missing = || PairingError::InvalidState("round 2 not computed".into());
        Ok(Self {
            a: to_even_length_hex(party.this_a.as_ref().ok_or_else(missing)?),
            zkp_a: party.this_zkp_a.as_ref().ok_or_else(missing)?.into(),
        })
    }

    pub fn apply_to(&self, party: &mut JPakeParty) -> Result<(), PairingError> {
        party.other_a = Some(from_hex(&self.a)?);
        party.other_zkp_a = Some(Zkp::try_from(&self.zkp_a)?);
        Ok(())
    }
}

/// Round-3 payload: key confirmation (`receiver3`) or credentials (`sender3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoPayload {
    pub ciphertext: String,
    pub iv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}

impl From<&EncryptedPayload> for CryptoPayload {
    fn from(p: &EncryptedPayload) -> Self {
        Self {
            ciphertext: B64.encode(&p.ciphertext),
            iv: B64.encode(&p.iv),
            hmac: p.hmac.map(hex::encode),
        }
    }
}

impl TryFrom<&CryptoPayload> for EncryptedPayload {
    type Error = PairingError;

    fn try_from(p: &CryptoPayload) -> Result<Self, Self::Error> {
        let hmac = match &p.hmac {
            Some(h) => {
                let mut tag = [0u8; 32];
                hex::decode_to_slice(h, &mut tag)
                    .map_err(|e| PairingError::Malformed(format!("hmac: {e}")))?;
                Some(tag)
            }
            None => None,
        };
        Ok(EncryptedPayload {
            ciphertext: B64.decode(&p.ciphertext)?,
            iv: B64.decode(&p.iv)?,
            hmac,
        })
    }
}
