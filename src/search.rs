//! `yams search`: field search over stored records.
//!
//! Each `--criterion` is one search-form line written as
//! `type|path|negator|mode|text`, for example
//! `Session|.METATRANSCRIPT.Session.Name|is|contains|kleve`. An empty type
//! or path leaves that part of the restriction open. The criteria are joined
//! with `--join intersect` (default) or `--join union`; `not` criteria are
//! always subtracted from the joined set.

use anyhow::{bail, Context, Result};
use yams_core::models::{FacetType, JoinType, MatchMode, Negator, SearchCriterion, SearchRequest};

use crate::config::Config;
use crate::db;

pub fn parse_criterion(spec: &str) -> Result<SearchCriterion> {
    let parts: Vec<&str> = spec.splitn(5, '|').collect();
    if parts.len() != 5 {
        bail!(
            "Invalid criterion '{}'. Expected type|path|is|contains|text.",
            spec
        );
    }
    let negator = match parts[2] {
        "is" => Negator::Is,
        "not" => Negator::Not,
        other => bail!("Unknown negator '{}'. Use is or not.", other),
    };
    let match_mode = match parts[3] {
        "contains" => MatchMode::Contains,
        "equals" => MatchMode::Equals,
        "fuzzy" => MatchMode::Fuzzy,
        other => bail!("Unknown match mode '{}'. Use contains, equals or fuzzy.", other),
    };
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    Ok(SearchCriterion {
        file_type: FacetType {
            node_type: non_empty(parts[0]),
            path: non_empty(parts[1]),
            ..Default::default()
        },
        negator,
        match_mode,
        text: parts[4].to_string(),
    })
}

pub fn parse_join(join: &str) -> Result<JoinType> {
    match join {
        "intersect" => Ok(JoinType::Intersect),
        "union" => Ok(JoinType::Union),
        other => bail!("Unknown join '{}'. Use intersect or union.", other),
    }
}

pub async fn run_search(config: &Config, criteria: &[String], join: &str) -> Result<()> {
    let request = SearchRequest {
        criteria: criteria
            .iter()
            .map(|c| parse_criterion(c))
            .collect::<Result<Vec<_>>>()?,
        join: parse_join(join)?,
    };

    let manager = db::connect(config)?;
    let results = manager
        .search(&request)
        .await
        .context("Search failed")?;

    let ids = results.matched_ids();
    if ids.is_empty() {
        println!("No results found.");
        return Ok(());
    }
    if let Some(label) = &results.label {
        println!("{}", label);
        println!();
    }
    for id in &ids {
        println!("{}", id);
        for path in results.highlighted_paths(id) {
            println!("    {}", path);
        }
    }
    println!();
    println!("{} result(s)", ids.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_criterion() {
        let c = parse_criterion("Session|.METATRANSCRIPT.Session.Name|not|equals|a|b").unwrap();
        assert_eq!(c.file_type.node_type.as_deref(), Some("Session"));
        assert_eq!(c.file_type.path.as_deref(), Some(".METATRANSCRIPT.Session.Name"));
        assert_eq!(c.negator, Negator::Not);
        assert_eq!(c.match_mode, MatchMode::Equals);
        // Only the first four separators split.
        assert_eq!(c.text, "a|b");
    }

    #[test]
    fn test_parse_open_criterion() {
        let c = parse_criterion("||is|fuzzy|kleve").unwrap();
        assert!(c.file_type.node_type.is_none());
        assert!(c.file_type.path.is_none());
        assert_eq!(c.match_mode, MatchMode::Fuzzy);
    }

    #[test]
    fn test_parse_rejects_bad_criteria() {
        assert!(parse_criterion("Session|is|contains").is_err());
        assert!(parse_criterion("a|b|maybe|contains|x").is_err());
        assert!(parse_criterion("a|b|is|like|x").is_err());
    }

    #[test]
    fn test_parse_join() {
        assert_eq!(parse_join("union").unwrap(), JoinType::Union);
        assert!(parse_join("xor").is_err());
    }
}
