//! Dumps the raw timeline of one metric into a CSV file.

use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::info;

use crate::args::CsvArgs;
use crate::client::TimeValue;
use crate::error::AppResult;

use super::ToolContext;

pub async fn run(context: &ToolContext, args: &CsvArgs) -> AppResult<()> {
    let client = super::connect(context).await?;
    let timeline = client
        .history_raw_timeline(&args.metric, args.start_time, args.end_time)
        .await?;
    client.close().await;

    let file = File::create(&args.output)?;
    let mut writer = BufWriter::new(file);
    write_csv(&mut writer, &args.metric, &timeline)?;
    writer.flush()?;

    info!(
        metric = %args.metric,
        rows = timeline.len(),
        output = %args.output.display(),
        "wrote timeline"
    );
    Ok(())
}

fn write_csv(writer: &mut impl Write, metric: &str, timeline: &[TimeValue]) -> std::io::Result<()> {
    writeln!(writer, "timestamp,{}", csv_escape(metric))?;
    for sample in timeline {
        writeln!(writer, "{},{}", sample.timestamp, sample.value)?;
    }
    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    #[test]
    fn writes_header_and_one_row_per_sample() {
        let timeline = [
            TimeValue {
                timestamp: Timestamp::from_posix_nanos(1_619_913_600_000_000_000),
                value: 42.5,
            },
            TimeValue {
                timestamp: Timestamp::from_posix_nanos(1_619_913_601_000_000_000),
                value: 43.0,
            },
        ];
        let mut buffer = Vec::new();
        write_csv(&mut buffer, "elab.power", &timeline).unwrap();
        let content = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,elab.power");
        assert!(lines[1].starts_with("2021-05-02T00:00:00"));
        assert!(lines[1].ends_with(",42.5"));
    }

    #[test]
    fn metric_names_with_commas_are_quoted() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("plain"), "plain");
    }
}
