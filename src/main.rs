
use tracing;
use tracing_subscriber;
use clap::{self, Parser};

use seqrule::*;
use io::{read_sequences, write_statistics, FileRuleSink};

#[derive(Parser)]
struct Arguments {
    /// sequence database to mine
    #[arg()]
    input: String,
    /// file the discovered rules are written to
    #[arg()]
    output: String,
    /// minimum confidence of a rule, within [0, 1]
    #[arg( long )]
    min_confidence: f64,
    /// minimum utility of a rule; 0 is treated as 0.001 so the run does not
    /// enumerate every rule
    #[arg( long )]
    min_utility: f64,
    /// maximum number of items in a rule antecedent
    #[arg( long, default_value_t = 5 )]
    max_antecedent_size: usize,
    /// maximum number of items in a rule consequent
    #[arg( long, default_value_t = 5 )]
    max_consequent_size: usize,
    /// number of sequences read from the input at most
    #[arg( long, default_value_t = usize::MAX )]
    max_sequences: usize,
    /// cap on the iterative item removal rounds
    #[arg( long, default_value_t = usize::MAX )]
    max_remove_rounds: usize,
    /// keep items whose estimated utility stays below the threshold
    #[arg( long, default_value_t = false )]
    no_item_pruning: bool,
    /// keep seed rules whose estimated utility stays below the threshold
    #[arg( long, default_value_t = false )]
    no_pair_pruning: bool,
    /// use sorted id lists instead of bitsets for sequence id sets
    #[arg( long, default_value_t = false )]
    sorted_sids: bool,
    /// optional path to write the run statistics to as JSON
    #[arg( long )]
    stats: Option<String>,
    /// Run with debug logging
    #[arg( long, default_value_t = false )]
    debug: bool,
}

fn setup_logging( args: &Arguments ) -> Result<(), String> {
    let tracer = tracing_subscriber::fmt::fmt();
    let tracer = if args.debug {
	tracer.with_max_level( tracing_subscriber::filter::LevelFilter::TRACE )
    } else {
	tracer.with_max_level( tracing_subscriber::filter::LevelFilter::INFO )
    };
    let tracer = tracer.finish();
    tracing::subscriber::set_global_default( tracer ).map_err( |err| err.to_string() )
}

fn initialize_miner( args: &Arguments ) -> Result<RuleMiner, String> {
    let representation = if args.sorted_sids { SidRepresentation::Sorted } else { SidRepresentation::Bits };
    RuleMiner::new( MinerParameters{
	min_confidence: args.min_confidence,
	min_utility: args.min_utility,
	max_antecedent_size: args.max_antecedent_size,
	max_consequent_size: args.max_consequent_size,
	max_remove_rounds: args.max_remove_rounds,
	prune_unpromising_items: !args.no_item_pruning,
	prune_seed_pairs: !args.no_pair_pruning,
	representation,
    })
}

fn finalize_results( args: &Arguments, miner: &RuleMiner ) -> Result<(), String> {
    if let Some( path ) = &args.stats {
	write_statistics( miner.statistics(), path.as_str() )
    } else {
	Result::Ok( () )
    }
}

fn main() -> Result<(), String> {
    let args = Arguments::parse();
    setup_logging( &args )?;
    let mut miner = initialize_miner( &args )?;
    let database = read_sequences( &args.input, args.max_sequences )?;
    let mut sink = FileRuleSink::create( &args.output )?;
    miner.mine( database, &mut sink )?;
    sink.finish()?;
    finalize_results( &args, &miner )
}
