//! CSV export of a finished run (feature `csv`).

use std::fs::File;
use std::path::Path;

use csv::Writer;
use ndarray::Array2;

use crate::error::Result;
use crate::tmcmc::StageInfo;

/// Saves a population as CSV.
///
/// The file has a header row `sample,dim_0,dim_1,...` followed by one row per
/// sample. A population without columns produces the `sample` header only.
///
/// # Examples
///
/// ```rust
/// # use mini_tmcmc::io::save_population_csv;
/// let samples = ndarray::arr2(&[[0.5, 1.5], [2.5, 3.5]]);
/// let file = std::env::temp_dir().join("population.csv");
/// save_population_csv(&samples, &file)?;
/// # Ok::<(), mini_tmcmc::error::TmcmcError>(())
/// ```
pub fn save_population_csv<Q: AsRef<Path>>(samples: &Array2<f64>, filename: Q) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let mut header = vec!["sample".to_string()];
    header.extend((0..samples.ncols()).map(|i| format!("dim_{i}")));
    wtr.write_record(&header)?;

    for (i, row) in samples.rows().into_iter().enumerate() {
        let mut record = vec![i.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Saves the per-stage diagnostics of a run as CSV, one row per stage.
pub fn save_stages_csv<Q: AsRef<Path>>(stages: &[StageInfo], filename: Q) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    wtr.write_record([
        "stage",
        "beta",
        "beta_next",
        "log_evidence_increment",
        "ess",
        "acceptance_rate",
    ])?;
    for s in stages {
        wtr.write_record(&[
            s.stage.to_string(),
            s.beta.to_string(),
            s.beta_next.to_string(),
            s.log_evidence_increment.to_string(),
            s.ess.to_string(),
            s.acceptance_rate.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
