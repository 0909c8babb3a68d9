//! Opaque handles naming stored render results.
//!
//! A handle is a creation timestamp plus three random 63-bit integers.
//! Collisions are treated as negligible. Handles travel in three encodings:
//!
//! | Form | Example |
//! |------|---------|
//! | Path | `/display/1300000000-11-22-33.png` |
//! | Params | `hStamp=1300000000`, `h1=11`, `h2=22`, `h3=33` |
//! | Storage key | `1300000000112233` |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rand::Rng;

use crate::error::{Error, Result};

/// Flat key/value form used to hand requests and handles to a task queue.
pub type Params = BTreeMap<String, String>;

const STAMP_KEY: &str = "hStamp";
const N1_KEY: &str = "h1";
const N2_KEY: &str = "h2";
const N3_KEY: &str = "h3";

/// Identifier of one render job and its stored result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    timestamp: i64,
    n1: i64,
    n2: i64,
    n3: i64,
}

impl Handle {
    pub fn new(timestamp: i64, n1: i64, n2: i64, n3: i64) -> Self {
        Self { timestamp, n1, n2, n3 }
    }

    /// Fresh handle stamped with the current time.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Fresh handle drawing its random parts from `rng`.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            n1: rng.gen_range(0..=i64::MAX),
            n2: rng.gen_range(0..=i64::MAX),
            n3: rng.gen_range(0..=i64::MAX),
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Path form: `/{page}/{timestamp}-{n1}-{n2}-{n3}.{suffix}`.
    pub fn to_path(&self, page: &str, suffix: &str) -> String {
        format!("/{}/{}.{}", page, self, suffix)
    }

    /// Parse the path form produced by [`to_path`](Self::to_path).
    ///
    /// The page and suffix are not checked; only the structure is.
    pub fn parse_path(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() != 3 {
            return Err(Error::malformed_handle(path, "expected /{page}/{file}"));
        }
        if !segments[0].is_empty() {
            return Err(Error::malformed_handle(path, "missing leading slash"));
        }

        let file_parts: Vec<&str> = segments[2].split('.').collect();
        if file_parts.len() != 2 {
            return Err(Error::malformed_handle(path, "expected exactly one '.' in file name"));
        }

        let pieces: Vec<&str> = file_parts[0].split('-').collect();
        if pieces.len() != 4 {
            return Err(Error::malformed_handle(path, "expected four '-'-separated integers"));
        }

        let mut values = [0i64; 4];
        for (value, piece) in values.iter_mut().zip(&pieces) {
            *value = piece
                .parse()
                .map_err(|_| Error::malformed_handle(path, &format!("{:?} is not an integer", piece)))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Add the parameter form (`hStamp`, `h1`, `h2`, `h3`) to `params`.
    pub fn write_params(&self, params: &mut Params) {
        params.insert(STAMP_KEY.to_string(), self.timestamp.to_string());
        params.insert(N1_KEY.to_string(), self.n1.to_string());
        params.insert(N2_KEY.to_string(), self.n2.to_string());
        params.insert(N3_KEY.to_string(), self.n3.to_string());
    }

    /// Parse the parameter form written by [`write_params`](Self::write_params).
    pub fn from_params(params: &Params) -> Result<Self> {
        Ok(Self {
            timestamp: parse_param(params, STAMP_KEY)?,
            n1: parse_param(params, N1_KEY)?,
            n2: parse_param(params, N2_KEY)?,
            n3: parse_param(params, N3_KEY)?,
        })
    }

    /// Blob storage key: all four integers with no separators between the
    /// random parts.
    pub fn storage_key(&self) -> String {
        format!("{}{}{}{}", self.timestamp, self.n1, self.n2, self.n3)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.timestamp, self.n1, self.n2, self.n3)
    }
}

/// Value of `key`, failing with [`Error::MissingParameter`] when absent or empty.
pub(crate) fn required_param<'a>(params: &'a Params, key: &str) -> Result<&'a str> {
    match params.get(key) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingParameter(key.to_string())),
    }
}

/// Parsed value of `key`, failing with [`Error::InvalidParameter`] when it
/// does not parse.
pub(crate) fn parse_param<T: FromStr>(params: &Params, key: &str) -> Result<T> {
    let raw = required_param(params, key)?;
    raw.parse().map_err(|_| Error::invalid_parameter(key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_parts_are_63_bit() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let h = Handle::generate_with(&mut rng);
            assert!(h.n1 >= 0 && h.n2 >= 0 && h.n3 >= 0);
        }
    }

    #[test]
    fn test_generated_handles_differ() {
        assert_ne!(Handle::generate(), Handle::generate());
    }

    #[test]
    fn test_params_round_trip() {
        let h = Handle::generate();
        let mut params = Params::new();
        h.write_params(&mut params);

        assert_eq!(Handle::from_params(&params).unwrap(), h);
    }

    #[test]
    fn test_path_round_trip() {
        let h = Handle::generate();
        let path = h.to_path("display", "png");

        assert!(path.starts_with("/display/"));
        assert!(path.ends_with(".png"));
        assert_eq!(Handle::parse_path(&path).unwrap(), h);
    }

    #[test]
    fn test_path_format() {
        let h = Handle::new(1300000000, 11, 22, 33);
        assert_eq!(h.to_path("render", "svg"), "/render/1300000000-11-22-33.svg");
        assert_eq!(h.storage_key(), "1300000000112233");
    }

    #[test]
    fn test_malformed_paths() {
        for path in [
            "display/1-2-3-4.png",
            "/display/extra/1-2-3-4.png",
            "x/display/1-2-3-4.png",
            "/display/1-2-3-4",
            "/display/1-2-3-4.png.bak",
            "/display/1-2-3.png",
            "/display/1-2-3-4-5.png",
            "/display/1-2-x-4.png",
        ] {
            assert!(
                matches!(Handle::parse_path(path), Err(Error::MalformedHandle { .. })),
                "accepted {}",
                path
            );
        }
    }

    #[test]
    fn test_missing_param_is_named() {
        let mut params = Params::new();
        Handle::new(1, 2, 3, 4).write_params(&mut params);
        params.remove("h2");

        match Handle::from_params(&params) {
            Err(Error::MissingParameter(key)) => assert_eq!(key, "h2"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_param_is_named() {
        let mut params = Params::new();
        Handle::new(1, 2, 3, 4).write_params(&mut params);
        params.insert("hStamp".to_string(), "yesterday".to_string());

        match Handle::from_params(&params) {
            Err(Error::InvalidParameter { key, value }) => {
                assert_eq!(key, "hStamp");
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
