use std::{
    error::Error,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use attrscore::{
    args::{AttrScoreArgs, Command},
    config_loader::{load_config, IndexConfig},
    Algorithm, AttrScoreInvertedIndex, DocId, Score, Weight,
};
use clap::Parser;

/// Parses `term:value`; a bare term gets `default`.
fn parse_pair(token: &str, default: u32) -> Result<(&str, u32), Box<dyn Error>> {
    match token.rsplit_once(':') {
        Some((term, value)) if !term.is_empty() => Ok((term, value.parse()?)),
        Some(_) => Err(format!("empty term in `{}`", token).into()),
        None => Ok((token, default)),
    }
}

/// Parses one `doc_id<TAB>term:score ...` line. Blank lines and lines
/// starting with `#` yield `None`.
fn parse_document(line: &str) -> Result<Option<(DocId, Vec<(&str, Score)>)>, Box<dyn Error>> {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (doc_id, rest) = line
        .split_once('\t')
        .ok_or_else(|| format!("missing tab after docID in `{}`", line))?;
    let doc_id: DocId = doc_id.trim().parse()?;
    let terms = rest
        .split_whitespace()
        .map(|token| parse_pair(token, 1))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some((doc_id, terms)))
}

fn build(input: &Path, output: &Path, config: IndexConfig) -> Result<(), Box<dyn Error>> {
    let index = AttrScoreInvertedIndex::new(config)?;
    let mut writer = index.writer()?;
    let reader = BufReader::new(File::open(input)?);
    let mut documents = 0u64;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let Some((doc_id, terms)) = parse_document(&line)
            .map_err(|err| format!("{}:{}: {}", input.display(), line_no + 1, err))?
        else {
            continue;
        };
        writer.insert_doc(doc_id, &terms)?;
        documents += 1;
    }
    let sealed = writer.flush()?;
    log::info!(
        "indexed {} documents, flush sealed {} buffers",
        documents,
        sealed
    );
    index.save_to_path(output)?;
    Ok(())
}

fn query(
    index_path: &Path,
    config: &IndexConfig,
    terms: &[String],
    hits: usize,
    ranked: bool,
) -> Result<(), Box<dyn Error>> {
    let index = AttrScoreInvertedIndex::load_from_path(index_path, config)?;
    let terms = terms
        .iter()
        .map(|token| parse_pair(token, 1))
        .collect::<Result<Vec<(&str, Weight)>, _>>()?;
    let algorithm = if ranked {
        Algorithm::SvSRanked
    } else {
        Algorithm::SvS
    };
    let result = index.reader().retrieve(algorithm, &terms, None, hits)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = AttrScoreArgs::parse();
    let config = load_config(&args.config)?.index;

    match args.command {
        Command::Build { input, output } => build(&input, &output, config),
        Command::Query {
            index,
            terms,
            hits,
            ranked,
        } => query(&index, &config, &terms, hits, ranked),
        Command::Stats { index } => {
            let index = AttrScoreInvertedIndex::load_from_path(&index, &config)?;
            println!("{}", serde_json::to_string_pretty(&index.stats())?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let (doc, terms) = parse_document("42\tred:3 blue:1 green")
            .unwrap()
            .unwrap();
        assert_eq!(doc, 42);
        assert_eq!(terms, vec![("red", 3), ("blue", 1), ("green", 1)]);

        assert!(parse_document("").unwrap().is_none());
        assert!(parse_document("# comment").unwrap().is_none());
        assert!(parse_document("7 red:1").is_err());
        assert!(parse_document("7\tred:x").is_err());
        assert!(parse_document("7\t:4").is_err());
    }

    #[test]
    fn test_parse_pair_keeps_colons_in_terms() {
        assert_eq!(parse_pair("a:b:2", 1).unwrap(), ("a:b", 2));
    }

    #[test]
    fn test_build_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("docs.tsv");
        let output = dir.path().join("index.bin");
        std::fs::write(&input, "0\ta:1 b:1\n1\tb:1 c:1\n2\ta:1 b:1 c:1\n").unwrap();
        build(&input, &output, IndexConfig::default()).unwrap();

        let index = AttrScoreInvertedIndex::load_from_path(&output, &IndexConfig::default()).unwrap();
        let result = index
            .reader()
            .retrieve(Algorithm::SvS, &[("a", 1), ("b", 1)], None, 10)
            .unwrap();
        assert_eq!(result.doc_ids, vec![0, 2]);
        assert_eq!(index.stats().num_docs, 3);
    }
}
