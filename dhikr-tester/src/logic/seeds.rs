use anyhow::{Result, bail};
use sha2::{Digest, Sha256};

/// Seed plus the token it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub label: String,
}

/// Resolve CLI seed tokens.
///
/// Accepts decimal and `0x` hex integers; any other token is hashed into a
/// seed so runs can be named ("ramadan", "qa-42").
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut seeds: Vec<SeedInfo> = Vec::new();
    for token in tokens {
        let seed = parse_seed(token);
        if seeds.iter().any(|info| info.seed == seed) {
            continue;
        }
        seeds.push(SeedInfo {
            seed,
            label: token.clone(),
        });
    }
    if seeds.is_empty() {
        bail!("no seeds supplied");
    }
    Ok(seeds)
}

fn parse_seed(token: &str) -> u64 {
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        && let Ok(value) = u64::from_str_radix(&hex.replace('_', ""), 16)
    {
        return value;
    }
    if let Ok(value) = token.parse::<u64>() {
        return value;
    }
    if let Ok(value) = token.parse::<i64>() {
        return value.unsigned_abs();
    }
    text_seed(token)
}

fn text_seed(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
