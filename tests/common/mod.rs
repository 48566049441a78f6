#![allow(dead_code)]

use chrono::NaiveDate;
use rxflow::application::engine::PharmacyEngine;
use rxflow::domain::prescription::PrescriptionDraft;
use rxflow::infrastructure::clock::FixedClock;
use rxflow::infrastructure::csv_file;
use rxflow::infrastructure::signing::SigningAuthority;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

/// The date every test engine believes it is.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

/// Writes `drugs.csv` with one row per `(name, price, quantity, expiry)`.
pub fn write_drugs_csv(dir: &Path, drugs: &[(&str, &str, u32, &str)]) -> Result<(), Error> {
    std::fs::create_dir_all(dir)?;
    let file = File::create(dir.join("drugs.csv"))?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["name", "price", "quantity", "expiry_date", "min_threshold"])?;
    for (name, price, quantity, expiry) in drugs {
        wtr.write_record([*name, *price, quantity.to_string().as_str(), *expiry, "10"])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Rewrites one column of one row of a CSV collection in place.
pub fn edit_csv_field(path: &Path, row: usize, column: &str, value: &str) -> Result<(), Error> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| Error::other(format!("no column {column}")))?;

    let mut rows: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>()?;
    let edited: csv::StringRecord = rows[row]
        .iter()
        .enumerate()
        .map(|(i, field)| if i == index { value } else { field })
        .collect();
    rows[row] = edited;

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&headers)?;
    for record in &rows {
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// An engine over CSV files in `data_dir`, signing with the key at `key_path`.
pub async fn open_csv_engine(data_dir: &Path, key_path: &Path) -> PharmacyEngine {
    let stores = csv_file::open_stores(data_dir).unwrap();
    let signer = SigningAuthority::load_or_create(key_path).unwrap();
    PharmacyEngine::open(stores, Arc::new(signer), Arc::new(FixedClock(today())))
        .await
        .unwrap()
}

pub fn draft(patient: &str, drug: &str, quantity: u32) -> PrescriptionDraft {
    PrescriptionDraft {
        doctor_name: "doc".to_string(),
        patient_name: patient.to_string(),
        drug_name: drug.to_string(),
        quantity,
        date: None,
        diagnosis: "Malaria".to_string(),
    }
}
