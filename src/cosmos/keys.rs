use crate::core::error::Error;
use bech32::{FromBase32, ToBase32, Variant};
use bip39::{Language, Mnemonic, MnemonicType, Seed};
use bitcoin::{
    hashes::{hash160, sha256, Hash},
    network::constants::Network,
    secp256k1::Secp256k1,
    util::bip32::{DerivationPath, ExtendedPrivKey, ExtendedPubKey},
};
use rand::Rng;
use serde::Deserialize;
use std::{path::Path, str::FromStr};
use tendermint::node;

/// First account of the Atom coin type.
pub const HD_PATH_ZERO: &str = "m/44'/118'/0'/0/0";
/// Second account of the Atom coin type.
pub const HD_PATH_ONE: &str = "m/44'/118'/0'/0/1";

pub const ACCOUNT_PREFIX: &str = "cosmos";

/// Generates a fresh 24 word English mnemonic.
pub fn create_mnemonic() -> String {
    Mnemonic::new(MnemonicType::Words24, Language::English)
        .phrase()
        .to_string()
}

/// Key entry stores the private and public keys along with the derived account.
#[derive(Clone, Debug)]
pub struct KeyEntry {
    pub public_key: ExtendedPubKey,
    pub private_key: ExtendedPrivKey,
    /// Bech32 account
    pub account: String,
    /// Raw 20 byte address
    pub address: Vec<u8>,
}

impl KeyEntry {
    /// Derives the secp256k1 key found at `hd_path` for `mnemonic`, the way the SDK keyring does
    /// with an empty BIP-39 passphrase.
    pub fn from_mnemonic(mnemonic: &str, hd_path: &str, prefix: &str) -> Result<Self, Error> {
        let mnemonic = Mnemonic::from_phrase(mnemonic, Language::English)
            .map_err(|e| Error::Key(format!("invalid mnemonic: {}", e)))?;
        let seed = Seed::new(&mnemonic, "");

        let path = DerivationPath::from_str(hd_path)
            .map_err(|e| Error::Key(format!("invalid hd path {}: {}", hd_path, e)))?;
        let secp = Secp256k1::new();
        let private_key = ExtendedPrivKey::new_master(Network::Bitcoin, seed.as_bytes())
            .and_then(|k| k.derive_priv(&secp, &path))
            .map_err(|e| Error::Key(format!("failed to derive private key: {}", e)))?;
        let public_key = ExtendedPubKey::from_priv(&secp, &private_key);

        let address = address_from_public_key(&public_key.public_key.serialize());
        let account = encode_address(prefix, &address)?;

        Ok(Self {
            public_key,
            private_key,
            account,
            address,
        })
    }
}

/// Address of a secp256k1 public key: RIPEMD160(SHA256(compressed key)).
pub fn address_from_public_key(public_key: &[u8]) -> Vec<u8> {
    hash160::Hash::hash(public_key).into_inner().to_vec()
}

pub fn encode_address(prefix: &str, address: &[u8]) -> Result<String, Error> {
    bech32::encode(prefix, address.to_base32(), Variant::Bech32)
        .map_err(|e| Error::Key(format!("bech32 encoding failed: {}", e)))
}

pub fn decode_address(account: &str) -> Result<Vec<u8>, Error> {
    bech32::decode(account)
        .and_then(|(_, data, _)| Vec::<u8>::from_base32(&data))
        .map_err(|e| Error::Key(format!("invalid bech32 account {}: {}", account, e)))
}

/// Address of a module account, eg. `gov` or `distribution`.
pub fn module_address(module: &str, prefix: &str) -> Result<String, Error> {
    let hash = sha256::Hash::hash(module.as_bytes()).into_inner();
    encode_address(prefix, &hash[..20])
}

/// A random, never used account address.
pub fn random_address(prefix: &str) -> Result<String, Error> {
    let bytes: [u8; 20] = rand::thread_rng().gen();
    encode_address(prefix, &bytes)
}

#[derive(Deserialize)]
struct NodeKeyFile {
    priv_key: TypedKey,
}

#[derive(Deserialize)]
struct TypedKey {
    #[serde(rename = "type")]
    key_type: String,
    value: String,
}

/// Reads the p2p identity written by `gaiad init` (`config/node_key.json`) and returns its node id.
pub fn node_id_from_key_file(path: impl AsRef<Path>) -> Result<node::Id, Error> {
    let content = std::fs::read_to_string(path.as_ref())?;
    node_id_from_key_json(&content)
}

pub fn node_id_from_key_json(content: &str) -> Result<node::Id, Error> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let key: NodeKeyFile = serde_json::from_str(content)?;
    if key.priv_key.key_type != "tendermint/PrivKeyEd25519" {
        return Err(Error::Key(format!(
            "unsupported node key type {}",
            key.priv_key.key_type
        )));
    }
    let bytes = STANDARD
        .decode(key.priv_key.value.as_bytes())
        .map_err(|e| Error::Key(format!("node key is not base64: {}", e)))?;
    // ed25519 private keys are serialized as seed || public key
    if bytes.len() != 64 {
        return Err(Error::Key(format!(
            "expected a 64 byte ed25519 key, got {} bytes",
            bytes.len()
        )));
    }
    let digest = sha256::Hash::hash(&bytes[32..]).into_inner();
    let mut id = [0u8; 20];
    id.copy_from_slice(&digest[..20]);
    Ok(node::Id::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_module_addresses() {
        assert_eq!(
            module_address("gov", ACCOUNT_PREFIX).unwrap(),
            "cosmos10d07y265gmmuvt4z0w9aw880jnsr700j6zn9kn"
        );
    }

    #[test]
    fn derivation_is_deterministic_per_path() {
        let mnemonic = create_mnemonic();
        assert_eq!(mnemonic.split_whitespace().count(), 24);

        let zero = KeyEntry::from_mnemonic(&mnemonic, HD_PATH_ZERO, ACCOUNT_PREFIX).unwrap();
        let again = KeyEntry::from_mnemonic(&mnemonic, HD_PATH_ZERO, ACCOUNT_PREFIX).unwrap();
        let one = KeyEntry::from_mnemonic(&mnemonic, HD_PATH_ONE, ACCOUNT_PREFIX).unwrap();

        assert_eq!(zero.account, again.account);
        assert_ne!(zero.account, one.account);
        assert!(zero.account.starts_with("cosmos1"));
        assert_eq!(zero.address.len(), 20);
        assert_eq!(decode_address(&zero.account).unwrap(), zero.address);
    }

    #[test]
    fn rejects_bad_mnemonic() {
        assert!(KeyEntry::from_mnemonic("not a mnemonic", HD_PATH_ZERO, ACCOUNT_PREFIX).is_err());
    }

    #[test]
    fn random_addresses_differ() {
        let a = random_address(ACCOUNT_PREFIX).unwrap();
        let b = random_address(ACCOUNT_PREFIX).unwrap();
        assert_ne!(a, b);
        assert_eq!(decode_address(&a).unwrap().len(), 20);
    }

    #[test]
    fn node_id_is_hash_of_public_half() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let mut key = [7u8; 64];
        key[32..].copy_from_slice(&[9u8; 32]);
        let json = format!(
            r#"{{"priv_key":{{"type":"tendermint/PrivKeyEd25519","value":"{}"}}}}"#,
            STANDARD.encode(key)
        );
        let id = node_id_from_key_json(&json).unwrap();

        let digest = sha256::Hash::hash(&[9u8; 32]).into_inner();
        assert_eq!(id.to_string(), hex::encode(&digest[..20]));
    }

    #[test]
    fn node_id_rejects_other_key_types() {
        let json = r#"{"priv_key":{"type":"tendermint/PrivKeySecp256k1","value":"AA=="}}"#;
        assert!(node_id_from_key_json(json).is_err());
    }
}
