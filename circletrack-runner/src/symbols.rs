//! Symbol list: a `code,name` CSV naming every tracked instrument.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("symbol list I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("symbol list CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("symbol list is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub code: String,
    #[serde(default)]
    pub name: String,
}

pub fn load_symbols(path: &Path) -> Result<Vec<Symbol>, SymbolError> {
    read_symbols(std::fs::File::open(path)?)
}

/// Parse a symbol list, dropping blank and repeated codes (first wins).
pub fn read_symbols(reader: impl Read) -> Result<Vec<Symbol>, SymbolError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut symbols: Vec<Symbol> = Vec::new();
    for record in csv.deserialize::<Symbol>() {
        let symbol = record?;
        if symbol.code.is_empty() || symbols.iter().any(|s| s.code == symbol.code) {
            continue;
        }
        symbols.push(symbol);
    }
    if symbols.is_empty() {
        return Err(SymbolError::Empty);
    }
    Ok(symbols)
}

pub fn codes(symbols: &[Symbol]) -> Vec<String> {
    symbols.iter().map(|s| s.code.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_codes_and_names() {
        let data = "code,name\n2330,TSMC\n0050, Top 50 \n";
        let symbols = read_symbols(data.as_bytes()).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[1].code, "0050");
        assert_eq!(symbols[1].name, "Top 50");
    }

    #[test]
    fn repeated_codes_keep_the_first() {
        let data = "code,name\n2330,TSMC\n2330,again\n";
        let symbols = read_symbols(data.as_bytes()).unwrap();
        assert_eq!(codes(&symbols), vec!["2330".to_string()]);
        assert_eq!(symbols[0].name, "TSMC");
    }

    #[test]
    fn header_only_is_empty() {
        assert!(matches!(
            read_symbols("code,name\n".as_bytes()),
            Err(SymbolError::Empty)
        ));
    }
}
