use super::ProcessCheckpoint;
use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Holds the data to restart a simulation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Time at the end of the last accepted step
    pub t: f64,

    /// Time increment of the next step
    pub dt_next: f64,

    /// Number of accepted steps
    pub timestep: usize,

    /// Number of linear solver failures so far
    pub n_solver_failures: usize,

    /// Using the fallback linear solver parameters
    pub using_fallback: bool,

    /// Solution fields published in the context
    pub fields: BTreeMap<String, Vector>,

    /// Data of each process (in the order of the simulation)
    pub processes: Vec<ProcessCheckpoint>,
}

impl Checkpoint {
    /// Reads a JSON file with the checkpoint
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let checkpoint = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(checkpoint)
    }

    /// Writes a JSON file with the checkpoint
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
