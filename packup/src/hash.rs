//! Content hashes of downloadable artifacts.
//!
//! Artifacts are content-addressed by their SHA-1, carried in manifests as 40
//! lower-case hex characters. Asset objects are additionally stored and served
//! under the first two characters of their hash.

use std::str::FromStr;
use std::fmt;


/// A SHA-1 content hash, as carried by version manifests and asset indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha1Hash(pub [u8; 20]);

impl Sha1Hash {

    /// Relative on-wire and on-disk path of an asset object with this hash, the
    /// two leading hex characters followed by the full hash.
    pub fn object_path(&self) -> String {
        let full = self.to_string();
        format!("{}/{full}", &full[..2])
    }

}

impl fmt::Display for Sha1Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// The parsed string is not exactly 40 hex characters.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid sha1 hex string")]
pub struct InvalidSha1Hex;

impl FromStr for Sha1Hash {

    type Err = InvalidSha1Hex;

    fn from_str(s: &str) -> Result<Self, Self::Err> {

        if s.len() != 40 || !s.is_ascii() {
            return Err(InvalidSha1Hex);
        }

        let mut bytes = [0u8; 20];
        for (byte, pair) in bytes.iter_mut().zip(s.as_bytes().chunks_exact(2)) {
            let pair = std::str::from_utf8(pair).map_err(|_| InvalidSha1Hex)?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| InvalidSha1Hex)?;
        }

        Ok(Self(bytes))

    }

}

impl serde::Serialize for Sha1Hash {

    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }

}

impl<'de> serde::Deserialize<'de> for Sha1Hash {

    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {

        struct Visitor;
        impl serde::de::Visitor<'_> for Visitor {

            type Value = Sha1Hash;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a 40 character sha1 hex string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }

        }

        deserializer.deserialize_str(Visitor)

    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn parse_and_render_round_trip() {
        let hash: Sha1Hash = "d3486ae9136e7856bc42212385ea797094475802".parse().unwrap();
        assert_eq!(hash.0[0], 0xd3);
        assert_eq!(hash.0[19], 0x02);
        assert_eq!(hash.to_string(), "d3486ae9136e7856bc42212385ea797094475802");
    }

    #[test]
    fn object_path_uses_two_leading_characters() {
        let hash = Sha1Hash([0xab; 20]);
        assert_eq!(hash.object_path(), format!("ab/{hash}"));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("".parse::<Sha1Hash>().is_err());
        assert!("d3486a".parse::<Sha1Hash>().is_err());
        assert!("zz486ae9136e7856bc42212385ea797094475802".parse::<Sha1Hash>().is_err());
        assert!("d3486ae9136e7856bc42212385ea7970944758020".parse::<Sha1Hash>().is_err());
    }

}
