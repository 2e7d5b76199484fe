use pmsys::sparse::MatrixDump;
use pmsys::StrError;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "pmsys_matrix_info",
    about = "Prints information about a binary matrix dump and optionally compares it with another dump"
)]
struct Options {
    /// Path to the binary dump
    dump: String,

    /// Path to another binary dump to compare with (bit-for-bit)
    #[structopt(long)]
    compare: Option<String>,
}

fn main() -> Result<(), StrError> {
    env_logger::init();

    // parse options
    let options = Options::from_args();

    // load data
    let dump = MatrixDump::read_file(&options.dump)?;

    // statistics
    let row_lengths: Vec<i32> = dump.row_start.windows(2).map(|w| w[1] - w[0]).collect();
    let min_len = row_lengths.iter().min().copied().unwrap_or(0);
    let max_len = row_lengths.iter().max().copied().unwrap_or(0);
    let min_value = dump.values.iter().fold(f64::INFINITY, |acc, x| f64::min(acc, *x));
    let max_value = dump.values.iter().fold(f64::NEG_INFINITY, |acc, x| f64::max(acc, *x));

    // message
    let thin_line = format!("{:─^1$}", "", 50);
    println!("{}", thin_line);
    println!("{}", options.dump);
    println!("{}", thin_line);
    println!("number of rows       = {}", dump.nrow);
    println!("number of entries    = {}", dump.nnz());
    println!("min/max row length   = {} / {}", min_len, max_len);
    if dump.nnz() > 0 {
        println!("min/max value        = {:e} / {:e}", min_value, max_value);
    }

    // parity check
    if let Some(other_path) = &options.compare {
        let other = MatrixDump::read_file(other_path)?;
        match dump.check_same(&other) {
            Ok(()) => println!("parity with {}: ✅ identical", other_path),
            Err(message) => {
                println!("parity with {}: 😱 {}", other_path, message);
                return Err("matrices are not identical");
            }
        }
    }
    println!("{}", thin_line);
    Ok(())
}
