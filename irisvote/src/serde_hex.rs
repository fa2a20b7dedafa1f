use curve25519_dalek::ristretto::CompressedRistretto;
use curve25519_dalek::scalar::Scalar;
use std::borrow::Cow;
use std::convert::TryInto;

pub use hex_buffer_serde::Hex;

// a single-purpose type for use in `#[serde(with)]`
pub enum RistrettoHex {}

impl Hex<CompressedRistretto> for RistrettoHex {
    type Error = String;

    fn create_bytes(point: &CompressedRistretto) -> Cow<[u8]> {
        point.as_bytes().to_vec().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<CompressedRistretto, String> {
        if bytes.len() != 32 {
            return Err(format!("expected 32 bytes, found {}", bytes.len()));
        }
        Ok(CompressedRistretto::from_slice(bytes))
    }
}

// a single-purpose type for use in `#[serde(with)]`
pub enum ScalarHex {}

impl Hex<Scalar> for ScalarHex {
    type Error = String;

    fn create_bytes(scalar: &Scalar) -> Cow<[u8]> {
        scalar.as_bytes().to_vec().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Scalar, String> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| format!("expected 32 bytes, found {}", bytes.len()))?;
        Scalar::from_canonical_bytes(bytes).ok_or_else(|| "non-canonical scalar".to_owned())
    }
}
