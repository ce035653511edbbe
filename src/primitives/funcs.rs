use crate::core::error::Error;
use serde::Serialize;
use std::{fs, path::Path};

/// Writes `body` to `path`, creating missing parent directories.
pub fn write_file(path: impl AsRef<Path>, body: &[u8]) -> Result<(), Error> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    log::debug!(target: "gaia-e2e", "wrote {}", path.display());
    Ok(())
}

/// Copies `src` over `dst`, returning the number of bytes copied.
pub fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<u64, Error> {
    let (src, dst) = (src.as_ref(), dst.as_ref());
    if !src.is_file() {
        return Err(Error::from(format!("{} is not a regular file", src.display())));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::copy(src, dst)?)
}

/// Makes `path` and everything below it world read/writable so the unprivileged user inside the
/// node image can use the mounted home directory.
#[cfg(unix)]
pub fn make_world_writable(path: impl AsRef<Path>) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    let path = path.as_ref();
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))?;
    if path.is_dir() {
        for entry in fs::read_dir(path)? {
            make_world_writable(entry?.path())?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn make_world_writable(_path: impl AsRef<Path>) -> Result<(), Error> {
    Ok(())
}

/// `uid:gid` owning `path`, handed to `docker run --user` so files a container writes into a
/// mounted directory stay readable by the harness.
#[cfg(unix)]
pub fn owner_of(path: impl AsRef<Path>) -> Result<Option<String>, Error> {
    use std::os::unix::fs::MetadataExt;

    let metadata = fs::metadata(path.as_ref())?;
    Ok(Some(format!("{}:{}", metadata.uid(), metadata.gid())))
}

#[cfg(not(unix))]
pub fn owner_of(_path: impl AsRef<Path>) -> Result<Option<String>, Error> {
    Ok(None)
}

/// Boolean parsing with the grammar Go's `strconv.ParseBool` accepts, which is what the
/// `GAIA_E2E_SKIP_CLEANUP` switch has always been documented with.
pub fn parse_bool(value: &str) -> Result<bool, Error> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(Error::from(format!("invalid boolean value {:?}", other))),
    }
}

/// Pretty prints `value` as JSON indented with `indent` instead of serde_json's two spaces.
pub fn to_json_indent<T: Serialize>(value: &T, indent: &[u8]) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent);
    let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
    value.serialize(&mut serializer)?;
    Ok(body)
}

/// Splits a coin list such as `110000000000stake,100photon` into `(amount, denom)` pairs.
pub fn parse_coins(coins: &str) -> Result<Vec<(String, String)>, Error> {
    coins
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|coin| {
            let split = coin
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(|| Error::from(format!("coin {:?} has no denom", coin)))?;
            let (amount, denom) = coin.split_at(split);
            if amount.is_empty() {
                return Err(Error::from(format!("coin {:?} has no amount", coin)));
            }
            Ok((amount.to_string(), denom.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_follows_go_grammar() {
        for truthy in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(parse_bool(truthy).unwrap(), "{truthy}");
        }
        for falsy in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!parse_bool(falsy).unwrap(), "{falsy}");
        }
        assert!(parse_bool("yes").is_err());
        assert!(parse_bool("tRuE").is_err());
    }

    #[test]
    fn parse_coins_splits_amount_and_denom() {
        let coins = parse_coins("110000000000stake,100000000000000000photon, 0.00001uatom").unwrap();
        assert_eq!(
            coins,
            vec![
                ("110000000000".to_string(), "stake".to_string()),
                ("100000000000000000".to_string(), "photon".to_string()),
                ("0.00001".to_string(), "uatom".to_string()),
            ]
        );
        assert!(parse_coins("uatom").is_err());
        assert!(parse_coins("100").is_err());
    }

    #[test]
    fn json_indent_is_configurable() {
        let value = serde_json::json!({"title": "x", "messages": [1]});
        let body = String::from_utf8(to_json_indent(&value, b" ").unwrap()).unwrap();
        assert_eq!(body, "{\n \"messages\": [\n  1\n ],\n \"title\": \"x\"\n}");
    }

    #[test]
    fn write_and_copy_create_parents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a/b/genesis.json");
        write_file(&src, b"{}").unwrap();
        let dst = dir.path().join("c/config/genesis.json");
        assert_eq!(copy_file(&src, &dst).unwrap(), 2);
        assert_eq!(fs::read(&dst).unwrap(), b"{}");
        assert!(copy_file(dir.path().join("missing"), &dst).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn owner_matches_metadata() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().unwrap();
        let metadata = fs::metadata(dir.path()).unwrap();
        assert_eq!(
            owner_of(dir.path()).unwrap(),
            Some(format!("{}:{}", metadata.uid(), metadata.gid()))
        );
        assert!(owner_of(dir.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn world_writable_is_recursive() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config/app.toml");
        write_file(&file, b"").unwrap();
        make_world_writable(dir.path()).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }
}
