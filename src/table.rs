use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{debug, info};

use crate::error::{PlotError, Result};

/// Column names for each role the plots need, resolved against the header once.
#[derive(Debug, Clone)]
pub struct Schema {
    pub chromosome: String,
    pub p_value: String,
    pub label: Option<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            chromosome: "chr".to_string(),
            p_value: "p".to_string(),
            label: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub schema: Schema,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            schema: Schema::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Position of the row in the table (0-based, file order)
    pub index: usize,
    /// Synthetic x coordinate on the Manhattan axis
    pub ind: usize,
    pub chromosome: String,
    pub p_value: f64,
    pub neg_log10_p: f64,
    pub label: Option<String>,
}

/// Contiguous run of `ind` values is NOT implied: a chromosome that reappears
/// later in the file keeps collecting rows into its first group.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromGroup {
    pub label: String,
    pub first_ind: usize,
    pub last_ind: usize,
    pub rows: Vec<usize>,
}

impl ChromGroup {
    /// Tick position for the chromosome label.
    pub fn midpoint(&self) -> f64 {
        let (first, last) = (self.first_ind as f64, self.last_ind as f64);
        last - (last - first) / 2.0
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    pub rows: Vec<Row>,
    pub groups: Vec<ChromGroup>,
}

impl ResultsTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn p_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.p_value).collect()
    }

    pub fn max_neg_log10_p(&self) -> Option<f64> {
        self.rows.iter().map(|r| r.neg_log10_p).reduce(f64::max)
    }
}

/// Load and annotate a delimited results table from disk.
pub fn load<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<ResultsTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| PlotError::InputNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let table = from_reader(BufReader::new(file), opts)?;
    info!(
        "Loaded {} rows in {} chromosome groups from {}",
        table.len(),
        table.groups.len(),
        path.display()
    );
    Ok(table)
}

pub fn from_reader<R: Read>(reader: R, opts: &LoadOptions) -> Result<ResultsTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(opts.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| PlotError::DataFormat(format!("cannot read header line: {e}")))?
        .clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(PlotError::DataFormat(
            "input has no header line".to_string(),
        ));
    }

    let column = |role: &str, name: &str| -> Result<usize> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            let available: Vec<&str> = headers.iter().collect();
            PlotError::DataFormat(format!(
                "{role} column '{name}' not found in header (columns: {})",
                available.join(", ")
            ))
        })
    };
    let schema = &opts.schema;
    let chr_idx = column("chromosome", &schema.chromosome)?;
    let p_idx = column("p-value", &schema.p_value)?;
    let label_idx = match &schema.label {
        Some(name) => Some(column("label", name)?),
        None => None,
    };
    debug!(
        "Resolved columns: chromosome={} p={} label={:?}",
        chr_idx, p_idx, label_idx
    );

    let mut rows: Vec<Row> = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        // header is line 1
        let line = i + 2;
        let record = record
            .map_err(|e| PlotError::DataFormat(format!("malformed record at line {line}: {e}")))?;
        let chromosome = record.get(chr_idx).unwrap_or_default().to_string();
        let raw_p = record.get(p_idx).unwrap_or_default();
        let p_value = parse_p_value(raw_p).map_err(|why| {
            PlotError::DataFormat(format!(
                "line {line}: p-value '{raw_p}' in column '{}' {why}",
                schema.p_value
            ))
        })?;
        let label = label_idx.map(|idx| record.get(idx).unwrap_or_default().to_string());
        rows.push(Row {
            index: i,
            ind: i,
            chromosome,
            p_value,
            neg_log10_p: -p_value.log10(),
            label,
        });
    }

    let groups = group_by_chromosome(&rows);
    Ok(ResultsTable { rows, groups })
}

/// A usable p-value is a number in (0, 1].
pub fn parse_p_value(raw: &str) -> std::result::Result<f64, &'static str> {
    let p: f64 = raw.parse().map_err(|_| "is not a number")?;
    if p.is_nan() {
        return Err("is not a number");
    }
    if p <= 0.0 || p > 1.0 {
        return Err("is outside (0, 1]");
    }
    Ok(p)
}

/// Group rows by chromosome label, keeping first-appearance order.
pub fn group_by_chromosome(rows: &[Row]) -> Vec<ChromGroup> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<ChromGroup> = Vec::new();
    for (pos, row) in rows.iter().enumerate() {
        match slot.get(row.chromosome.as_str()) {
            Some(&g) => {
                let group = &mut groups[g];
                group.last_ind = row.ind;
                group.rows.push(pos);
            }
            None => {
                slot.insert(row.chromosome.as_str(), groups.len());
                groups.push(ChromGroup {
                    label: row.chromosome.clone(),
                    first_ind: row.ind,
                    last_ind: row.ind,
                    rows: vec![pos],
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(input: &str) -> Result<ResultsTable> {
        from_reader(input.as_bytes(), &LoadOptions::default())
    }

    #[test]
    fn scenario_two_chromosomes() {
        let table = load_str("chr\tp\nchr1\t0.01\nchr1\t0.5\nchr2\t0.001\n").unwrap();
        assert_eq!(table.len(), 3);
        let inds: Vec<usize> = table.rows.iter().map(|r| r.ind).collect();
        assert_eq!(inds, vec![0, 1, 2]);

        let y: Vec<f64> = table.rows.iter().map(|r| r.neg_log10_p).collect();
        assert!((y[0] - 2.0).abs() < 1e-12);
        assert!((y[1] - 0.30103).abs() < 1e-5);
        assert!((y[2] - 3.0).abs() < 1e-12);

        assert_eq!(table.groups.len(), 2);
        assert_eq!(table.groups[0].label, "chr1");
        assert_eq!(table.groups[0].len(), 2);
        assert_eq!(table.groups[1].label, "chr2");
        assert_eq!(table.groups[1].len(), 1);
        assert_eq!(table.max_neg_log10_p(), Some(3.0));
    }

    #[test]
    fn ind_is_row_order() {
        let mut input = String::from("chr\tp\n");
        for i in 0..50 {
            input.push_str(&format!("{}\t0.{}\n", 22 - (i % 22), i + 1));
        }
        let table = load_str(&input).unwrap();
        for (i, row) in table.rows.iter().enumerate() {
            assert_eq!(row.ind, i);
            assert_eq!(row.index, i);
        }
        assert!(table.rows.windows(2).all(|w| w[0].ind < w[1].ind));
        let total: usize = table.groups.iter().map(|g| g.len()).sum();
        assert_eq!(total, table.len());
    }

    #[test]
    fn groups_follow_first_appearance() {
        let table = load_str("chr\tp\n10\t0.1\n2\t0.2\n10\t0.3\nX\t0.4\n1\t0.5\n").unwrap();
        let labels: Vec<&str> = table.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["10", "2", "X", "1"]);
        assert_eq!(table.groups[0].rows, vec![0, 2]);
        assert_eq!(table.groups[0].first_ind, 0);
        assert_eq!(table.groups[0].last_ind, 2);
    }

    #[test]
    fn midpoint_of_group() {
        let g = ChromGroup {
            label: "1".into(),
            first_ind: 4,
            last_ind: 9,
            rows: (4..=9).collect(),
        };
        assert_eq!(g.midpoint(), 6.5);
        let single = ChromGroup {
            label: "2".into(),
            first_ind: 7,
            last_ind: 7,
            rows: vec![7],
        };
        assert_eq!(single.midpoint(), 7.0);
    }

    #[test]
    fn custom_schema_and_delimiter() {
        let opts = LoadOptions {
            delimiter: b',',
            schema: Schema {
                chromosome: "CHR".into(),
                p_value: "P".into(),
                label: Some("SNP".into()),
            },
        };
        let input = "SNP,CHR,BP,P\nrs1,1,100,1e-8\nrs2,1,200,0.2\n";
        let table = from_reader(input.as_bytes(), &opts).unwrap();
        assert_eq!(table.rows[0].label.as_deref(), Some("rs1"));
        assert!((table.rows[0].neg_log10_p - 8.0).abs() < 1e-9);
        assert_eq!(table.groups.len(), 1);
    }

    #[test]
    fn missing_column_is_format_error() {
        let err = load_str("chrom\tp\n1\t0.1\n").unwrap_err();
        match err {
            PlotError::DataFormat(msg) => {
                assert!(msg.contains("'chr'"));
                assert!(msg.contains("chrom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let err = load_str("chr\tpval\n1\t0.1\n").unwrap_err();
        assert!(matches!(err, PlotError::DataFormat(_)));
    }

    #[test]
    fn missing_label_column_is_format_error() {
        let opts = LoadOptions {
            schema: Schema {
                label: Some("rsid".into()),
                ..Schema::default()
            },
            ..LoadOptions::default()
        };
        let err = from_reader("chr\tp\n1\t0.1\n".as_bytes(), &opts).unwrap_err();
        assert!(matches!(err, PlotError::DataFormat(msg) if msg.contains("rsid")));
    }

    #[test]
    fn bad_p_values_are_rejected() {
        for bad in ["abc", "NA", "0", "-0.1", "1.5", "NaN"] {
            let input = format!("chr\tp\n1\t0.1\n1\t{bad}\n");
            let err = load_str(&input).unwrap_err();
            match err {
                PlotError::DataFormat(msg) => assert!(msg.contains("line 3"), "{msg}"),
                other => panic!("unexpected error for {bad}: {other:?}"),
            }
        }
        assert!(load_str("chr\tp\n1\t1\n").is_ok());
    }

    #[test]
    fn ragged_row_is_format_error() {
        let err = load_str("chr\tp\n1\t0.1\n2\n").unwrap_err();
        assert!(matches!(err, PlotError::DataFormat(_)));
    }

    #[test]
    fn header_only_is_empty_table() {
        let table = load_str("chr\tp\n").unwrap();
        assert!(table.is_empty());
        assert!(table.groups.is_empty());
        assert_eq!(table.max_neg_log10_p(), None);
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = load_str("").unwrap_err();
        assert!(matches!(err, PlotError::DataFormat(_)));
    }

    #[test]
    fn missing_file_is_input_not_found() {
        let err = load("/definitely/not/here.tsv", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, PlotError::InputNotFound { .. }));
    }
}
