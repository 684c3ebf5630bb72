//! Serde adapters for filesystem values that plain derives cannot encode.
//!
//! Paths are written as strings when they are valid UTF-8 and as raw byte
//! arrays otherwise. Timestamps go through `chrono`, which also covers times
//! before the Unix epoch.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum PathRepr {
    Text(String),
    Bytes(Vec<u8>),
}

impl PathRepr {
    fn into_path(self) -> PathBuf {
        match self {
            PathRepr::Text(text) => PathBuf::from(text),
            PathRepr::Bytes(bytes) => path_from_bytes(bytes),
        }
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

fn serialize_one<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    if let Some(text) = path.to_str() {
        return serializer.serialize_str(text);
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        serializer.serialize_bytes(path.as_os_str().as_bytes())
    }

    #[cfg(not(unix))]
    {
        serializer.serialize_str(&path.to_string_lossy())
    }
}

/// `PathBuf` that survives non-UTF-8 names.
pub mod raw_path {
    use super::*;

    pub fn serialize<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_one(path, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
        Ok(PathRepr::deserialize(deserializer)?.into_path())
    }
}

/// `Vec<PathBuf>` that survives non-UTF-8 names.
pub mod raw_paths {
    use super::*;
    use serde::ser::SerializeSeq;

    struct One<'a>(&'a PathBuf);

    impl Serialize for One<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serialize_one(self.0, serializer)
        }
    }

    pub fn serialize<S: Serializer>(paths: &[PathBuf], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(paths.len()))?;
        for path in paths {
            seq.serialize_element(&One(path))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<PathBuf>, D::Error> {
        let reprs = Vec::<PathRepr>::deserialize(deserializer)?;
        Ok(reprs.into_iter().map(PathRepr::into_path).collect())
    }
}

/// `SystemTime` as an RFC 3339 timestamp.
pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        DateTime::<Utc>::from(*time).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        Ok(DateTime::<Utc>::deserialize(deserializer)?.into())
    }
}

/// `Option<SystemTime>` as an optional RFC 3339 timestamp.
pub mod opt_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error> {
        time.map(DateTime::<Utc>::from).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SystemTime>, D::Error> {
        Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?.map(SystemTime::from))
    }
}
