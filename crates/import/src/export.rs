use std::io::Write;
use tally_core::{ReconciledRecord, RecordSet, AMOUNT_NET_REBATE, CALCULATED_REBATE};

/// Writes a header line followed by one line per row.
pub fn write_csv<W, I>(writer: W, columns: &[String], rows: I) -> Result<(), csv::Error>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(columns)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn record_set_csv(set: &RecordSet) -> Result<Vec<u8>, csv::Error> {
    let mut buf = Vec::new();
    write_csv(
        &mut buf,
        &set.columns,
        set.iter().map(|r| r.to_row(&set.columns)),
    )?;
    Ok(buf)
}

/// `columns` is the joined layout; the rebate columns are appended to it.
pub fn reconciled_csv(
    columns: &[String],
    records: &[ReconciledRecord],
) -> Result<Vec<u8>, csv::Error> {
    let mut header = columns.to_vec();
    header.push(CALCULATED_REBATE.to_string());
    header.push(AMOUNT_NET_REBATE.to_string());

    let mut buf = Vec::new();
    write_csv(&mut buf, &header, records.iter().map(|r| r.to_row(columns)))?;
    Ok(buf)
}
