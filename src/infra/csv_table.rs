use crate::app::ports::TableStore;
use crate::error::{CleanerError, Result};
use crate::types::Table;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const UTF8_BOM: &str = "\u{feff}";

/// CSV files on local disk.
///
/// Loading accepts UTF-8 and falls back to Latin-1. Saving writes a sibling
/// temp file and renames it over the destination, so an interrupted save never
/// leaves a truncated file.
#[derive(Debug, Clone, Default)]
pub struct CsvTableStore;

impl CsvTableStore {
    pub fn new() -> Self {
        Self
    }

    fn decode(bytes: Vec<u8>) -> String {
        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                debug!("Input is not UTF-8, decoding as Latin-1");
                e.into_bytes().into_iter().map(char::from).collect()
            }
        }
    }

    fn parse(text: &str) -> std::result::Result<Table, csv::Error> {
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(headers);
        let width = table.headers.len();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            table.rows.push(row);
        }
        Ok(table)
    }

    fn temp_path(destination: &Path) -> PathBuf {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "output.csv".to_string());
        destination.with_file_name(format!(".{name}.tmp"))
    }
}

impl TableStore for CsvTableStore {
    fn load(&self, source: &Path) -> Result<Table> {
        let bytes = fs::read(source).map_err(|e| CleanerError::load(source, e))?;
        let text = Self::decode(bytes);
        let table = Self::parse(&text).map_err(|e| CleanerError::load(source, e))?;
        if table.headers.iter().all(|h| h.is_empty()) {
            return Err(CleanerError::load(source, "missing header row"));
        }
        Ok(table)
    }

    fn save(&self, table: &Table, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CleanerError::persist(destination, e))?;
        }
        let temp = Self::temp_path(destination);

        let write = || -> std::result::Result<(), Box<dyn std::error::Error>> {
            let mut writer = csv::Writer::from_path(&temp)?;
            writer.write_record(&table.headers)?;
            for row in &table.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
            Ok(())
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&temp);
            return Err(CleanerError::persist(destination, e));
        }

        fs::rename(&temp, destination).map_err(|e| CleanerError::persist(destination, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_utf8_with_bom_and_padding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "\u{feff}nom, prenom,email\nDupont, Pierre\nMartin,Léa,lea@acme.ch\n").unwrap();

        let table = CsvTableStore::new().load(&path).unwrap();
        assert_eq!(table.headers, vec!["nom", "prenom", "email"]);
        assert_eq!(table.rows[0], vec!["Dupont", "Pierre", ""]);
        assert_eq!(table.value(1, "prenom"), "Léa");
    }

    #[test]
    fn test_load_latin1_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.csv");
        // "Zoé" encoded as Latin-1
        fs::write(&path, b"nom,prenom\nMartin,Zo\xe9\n").unwrap();

        let table = CsvTableStore::new().load(&path).unwrap();
        assert_eq!(table.value(0, "prenom"), "Zoé");
    }

    #[test]
    fn test_load_keeps_blank_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "nom,prenom,raison_sociale\nDupont,,Acme\n").unwrap();

        let table = CsvTableStore::new().load(&path).unwrap();
        assert_eq!(table.headers, vec!["nom", "prenom", "raison_sociale"]);
        assert_eq!(table.value(0, "prenom"), "");
    }

    #[test]
    fn test_load_missing_file_is_load_error() {
        let err = CsvTableStore::new()
            .load(Path::new("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(matches!(err, CleanerError::Load { .. }));
    }

    #[test]
    fn test_load_empty_file_is_load_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            CsvTableStore::new().load(&path),
            Err(CleanerError::Load { .. })
        ));
    }

    #[test]
    fn test_save_replaces_destination_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("cleaned.csv");
        let store = CsvTableStore::new();
        let mut table = Table::new(vec!["nom".to_string(), "note".to_string()]);
        table.rows.push(vec!["Dupont".to_string(), "a, b".to_string()]);

        store.save(&table, &path).unwrap();
        table.rows.push(vec!["Martin".to_string(), String::new()]);
        store.save(&table, &path).unwrap();

        let reloaded = store.load(&path).unwrap();
        assert_eq!(reloaded.rows.len(), 2);
        assert_eq!(reloaded.value(0, "note"), "a, b");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }
}
