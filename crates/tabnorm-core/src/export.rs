//! Export of normalized tables to CSV and JSON

use crate::error::Result;
use crate::process::NormalizedTable;
use std::io::Write;

/// Write the visible columns of `table` as CSV, header from the column keys
pub fn write_csv<W: Write>(table: &NormalizedTable, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(table.columns.iter().map(|c| c.key.as_str()))?;
    for row in &table.rows {
        csv_writer.write_record(table.columns.iter().map(|c| {
            row.get(&c.key)
                .map(|v| v.to_string_value())
                .unwrap_or_default()
        }))?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write the whole table (rows, columns, merge details) as pretty JSON
pub fn write_json<W: Write>(table: &NormalizedTable, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, table)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
