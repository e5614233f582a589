use clap::Parser;

/// This is a preferential (instant-runoff) contest simulator.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file containing the scenario to simulate, in JSON format: the primary
    /// votes, the preference flows and the counting rules.
    /// For more information about the file format, read the documentation.
    #[clap(short, long, value_parser)]
    pub scenario: String,
    /// (file path) A reference file containing the summary of a simulation in JSON format. If provided, seatsim will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the simulation will be written in JSON format to the given
    /// location. When empty, the summary is printed to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (positive number or empty) If specified, overrides the size of the electorate given in the
    /// scenario file.
    #[clap(long, value_parser)]
    pub total_votes: Option<u64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
