/// Renders a plain left-aligned table with a header row and a separator,
/// column widths fitted to the content.
#[must_use]
pub fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let columns = header.len();
    let mut widths: Vec<usize> = header.iter().map(|cell| cell.len()).collect();
    for row in rows {
        for (index, cell) in row.iter().take(columns).enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.len());
            }
        }
    }

    let mut output = String::new();
    push_row(&mut output, header.iter().map(|cell| (*cell).to_owned()), &widths);
    push_row(
        &mut output,
        widths.iter().map(|width| "-".repeat(*width)),
        &widths,
    );
    for row in rows {
        push_row(&mut output, row.iter().cloned(), &widths);
    }
    output
}

fn push_row(output: &mut String, cells: impl Iterator<Item = String>, widths: &[usize]) {
    let mut line = String::new();
    for (index, cell) in cells.enumerate() {
        let width = widths.get(index).copied().unwrap_or(0);
        if index > 0 {
            line.push_str("  ");
        }
        line.push_str(&format!("{:<width$}", cell));
    }
    output.push_str(line.trim_end());
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_columns_to_content() {
        let table = render_table(
            &["JobID", "Job Name", "Energy"],
            &[
                vec!["1234".to_owned(), "simulation".to_owned(), "42.0".to_owned()],
                vec!["7".to_owned(), "x".to_owned(), "N/A".to_owned()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("JobID"));
        assert!(lines[1].starts_with("-----"));
        assert!(lines[2].contains("simulation"));
    }
}
