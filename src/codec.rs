//! What actually sits in a channel's slot while a value is in flight.
//!
//! Every write places a [`Packet`] in the slot: either an application value or
//! the reserved poison sentinel. Because the sentinel is a distinct enum variant it
//! can never be confused with a legitimate value, whatever `T` is.
//!
//! A [`Codec`] decides the in-flight representation. Units sharing memory use
//! [`Identity`], which moves the packet as-is. Units in separate address spaces
//! need bytes: [`Bincode`] serializes with `serde`, and [`Authenticated`]
//! additionally tags every message with an HMAC-SHA-256 so a reader can reject
//! data that did not come from a holder of the shared key.
//!
//! ```
//! use rendezvous::codec::{Authenticated, Codec, Packet};
//!
//! let codec = Authenticated::new(b"these/are/the/droids");
//! let wire = Codec::<u32>::encode(&codec, Packet::Data(7)).unwrap();
//! assert_eq!(codec.decode(wire).unwrap(), Packet::Data(7u32));
//! ```

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ChannelError, Result};

/// A value in flight, or the poison sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet<T> {
    Data(T),
    Poison,
}

pub trait Codec<T>: Send + Sync + 'static {
    type Wire: Send + 'static;

    fn encode(&self, packet: Packet<T>) -> Result<Self::Wire>;
    fn decode(&self, wire: Self::Wire) -> Result<Packet<T>>;
}

/// Moves packets unchanged. Used when reader and writer share memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<T: Send + 'static> Codec<T> for Identity {
    type Wire = Packet<T>;

    fn encode(&self, packet: Packet<T>) -> Result<Packet<T>> {
        Ok(packet)
    }

    fn decode(&self, wire: Packet<T>) -> Result<Packet<T>> {
        Ok(wire)
    }
}

/// Serializes packets to bytes with `bincode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

impl<T> Codec<T> for Bincode
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Wire = Vec<u8>;

    fn encode(&self, packet: Packet<T>) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&packet)?)
    }

    fn decode(&self, wire: Vec<u8>) -> Result<Packet<T>> {
        Ok(bincode::deserialize(&wire)?)
    }
}

const TAG_LEN: usize = 32;
const BLOCK_LEN: usize = 64;

/// `bincode` bytes followed by an HMAC-SHA-256 tag over them.
///
/// Decoding fails with [`ChannelError::CorruptedData`] if the tag does not match.
#[derive(Clone)]
pub struct Authenticated {
    key: [u8; BLOCK_LEN],
}

impl Authenticated {
    pub fn new(key: &[u8]) -> Self {
        let mut block = [0u8; BLOCK_LEN];
        if key.len() > BLOCK_LEN {
            block[..TAG_LEN].copy_from_slice(&Sha256::digest(key));
        } else {
            block[..key.len()].copy_from_slice(key);
        }
        Self { key: block }
    }

    fn tag(&self, message: &[u8]) -> [u8; TAG_LEN] {
        let mut inner = Sha256::new();
        inner.update(self.key.map(|b| b ^ 0x36));
        inner.update(message);
        let mut outer = Sha256::new();
        outer.update(self.key.map(|b| b ^ 0x5c));
        outer.update(inner.finalize());
        outer.finalize().into()
    }
}

impl<T> Codec<T> for Authenticated
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    type Wire = Vec<u8>;

    fn encode(&self, packet: Packet<T>) -> Result<Vec<u8>> {
        let mut wire = bincode::serialize(&packet)?;
        let tag = self.tag(&wire);
        wire.extend_from_slice(&tag);
        Ok(wire)
    }

    fn decode(&self, mut wire: Vec<u8>) -> Result<Packet<T>> {
        if wire.len() < TAG_LEN {
            return Err(ChannelError::CorruptedData);
        }
        let tag = wire.split_off(wire.len() - TAG_LEN);
        let expected = self.tag(&wire);
        // constant time
        let diff = tag.iter().zip(expected).fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            return Err(ChannelError::CorruptedData);
        }
        Ok(bincode::deserialize(&wire)?)
    }
}
