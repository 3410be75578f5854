
use std::path::Path;
use std::fs::File;
use std::io::{BufReader, BufRead, BufWriter, Write};
use std::mem;

use serde_json as json;

use crate::{Item, Utility, Itemvec, Sequence, SequenceDatabase};

/// Reads a sequence database from a file, one sequence per line, keeping at
/// most `limit` sequences. Blank lines are skipped; anything else that does
/// not parse is fatal.
pub fn read_sequences( path: &str, limit: usize ) -> Result<SequenceDatabase, String> {
    let path = Path::new( path );
    let file = File::open( path ).map_err( |err| err.to_string() )?;
    let reader = BufReader::new( file );

    let mut database = SequenceDatabase::new();
    for (number, line) in reader.lines().enumerate() {
	if database.len() == limit {
	    break;
	}
	let line = line.map_err( |err| err.to_string() )?;
	let parsed = parse_sequence( &line ).map_err( |err| format!( "line {}: {}", number + 1, err ))?;
	if let Some( sequence ) = parsed {
	    database.push( sequence );
	}
    }
    Result::Ok( database )
}

/// Parses one line of the database format. Tokens are whitespace separated:
/// `item` or `item:utility` adds an item (utility defaults to 1), `-1`
/// closes the current itemset, `-2` closes the sequence, and a
/// `SUtility:<value>` token fixes the sequence utility instead of summing.
/// Returns None for blank lines.
pub fn parse_sequence( line: &str ) -> Result<Option<Sequence>, String> {
    if line.trim().is_empty() {
	return Result::Ok( None );
    }

    let mut sequence = Sequence::new();
    let mut items: Itemvec = Vec::new();
    let mut utilities: Vec<Utility> = Vec::new();
    let mut fixed_utility: Option<Utility> = None;
    let mut terminated = false;

    for token in line.split_whitespace() {
	if let Some( text ) = token.strip_prefix( "SUtility:" ) {
	    let utility: Utility = text.parse().map_err( |_| format!( "invalid sequence utility '{}'", token ))?;
	    if utility <= 0.0 {
		return Result::Err( format!( "sequence utility must be positive, got '{}'", token ));
	    }
	    fixed_utility = Some( utility );
	    continue;
	}
	if token == "-1" || token == "-2" {
	    if terminated {
		return Result::Err( format!( "token '{}' after the sequence terminator", token ));
	    }
	    if !items.is_empty() {
		sequence.push_itemset( mem::take( &mut items ), mem::take( &mut utilities ));
	    }
	    terminated = token == "-2";
	    continue;
	}
	if terminated {
	    return Result::Err( format!( "token '{}' after the sequence terminator", token ));
	}
	let (item, utility) = parse_item( token )?;
	items.push( item );
	utilities.push( utility );
    }

    if !terminated {
	return Result::Err( format!( "sequence line lacks the -2 terminator: '{}'", line ));
    }
    if sequence.is_empty() {
	return Result::Err( format!( "sequence line holds no items: '{}'", line ));
    }
    if let Some( utility ) = fixed_utility {
	sequence.set_exact_utility( utility );
    }
    Result::Ok( Some( sequence ))
}

/// Parses `item` or `item:utility` into an item and its utility
fn parse_item( token: &str ) -> Result<(Item, Utility), String> {
    let (item_text, utility_text) = match token.split_once( ':' ) {
	Some( (item, utility) ) => (item, Some( utility )),
	None => (token, None),
    };
    let item: Item = item_text.parse().map_err( |_| format!( "invalid item token '{}'", token ))?;
    if item == 0 {
	return Result::Err( format!( "items are positive integers, got '{}'", token ));
    }
    let utility: Utility = match utility_text {
	Some( text ) => text.parse().map_err( |_| format!( "invalid utility in token '{}'", token ))?,
	None => 1.0,
    };
    if utility <= 0.0 {
	return Result::Err( format!( "utilities must be positive, got '{}'", token ));
    }
    Result::Ok( (item, utility) )
}

/// A discovered rule on its way out of the engine
pub struct RuleRecord<'a> {
    pub antecedent: &'a [Item],
    pub consequent: &'a [Item],
    pub utility: Utility,
    pub support: usize,
    pub confidence: f64,
}

/// Receives every accepted rule. A failing sink aborts the mining run.
pub trait RuleSink {
    fn accept( &mut self, rule: &RuleRecord ) -> Result<(), String>;
}

/// Renders a rule in the output format, one line without the newline
pub fn format_rule( rule: &RuleRecord ) -> String {
    format!(
	"{}\t==> \t{}\t#SUP: {}\t#CONF: {}\t#UTIL: {}",
	join_items( rule.antecedent ),
	join_items( rule.consequent ),
	rule.support,
	rule.confidence,
	rule.utility,
    )
}

fn join_items( items: &[Item] ) -> String {
    let mut text = String::new();
    for (position, item) in items.iter().enumerate() {
	if position > 0 {
	    text.push( ',' );
	}
	text.push_str( &item.to_string() );
    }
    text
}

/// Writes rules to a file through a buffered writer
pub struct FileRuleSink {
    writer: BufWriter<File>,
}

impl FileRuleSink {

    pub fn create( path: &str ) -> Result<FileRuleSink, String> {
	let file = File::create( Path::new( path )).map_err( |err| err.to_string() )?;
	Result::Ok( FileRuleSink{ writer: BufWriter::new( file ) })
    }

    /// Flushes and closes the sink
    pub fn finish( mut self ) -> Result<(), String> {
	self.writer.flush().map_err( |err| err.to_string() )
    }
}

impl RuleSink for FileRuleSink {
    fn accept( &mut self, rule: &RuleRecord ) -> Result<(), String> {
	writeln!( self.writer, "{}", format_rule( rule )).map_err( |err| err.to_string() )
    }
}

/// An accepted rule with owned sides, as kept by the collector
#[derive( Debug, Clone, PartialEq )]
pub struct CollectedRule {
    pub antecedent: Itemvec,
    pub consequent: Itemvec,
    pub utility: Utility,
    pub support: usize,
    pub confidence: f64,
}

/// Keeps accepted rules in memory
pub struct RuleCollector {
    pub rules: Vec<CollectedRule>,
}

impl RuleCollector {

    pub fn new() -> RuleCollector {
	RuleCollector{ rules: Vec::new() }
    }
}

impl RuleSink for RuleCollector {
    fn accept( &mut self, rule: &RuleRecord ) -> Result<(), String> {
	self.rules.push( CollectedRule{
	    antecedent: rule.antecedent.to_vec(),
	    consequent: rule.consequent.to_vec(),
	    utility: rule.utility,
	    support: rule.support,
	    confidence: rule.confidence,
	});
	Result::Ok( () )
    }
}

/// Writes a serializeable statistics record to a file
pub fn write_statistics<S: serde::Serialize>( statistics: &S, path: &str ) -> Result<(), String> {
    match json::to_string( statistics ) {
	json::Result::Ok( text ) => {
	    let path = Path::new( path );
	    let mut file = File::create( path ).map_err( |err| err.to_string() )?;
	    write!( file, "{}", text ).map_err( |err| err.to_string() )
	},
	json::Result::Err( err ) => Result::Err( err.to_string() ),
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_parse_single_sequence() {
	let sequence = parse_sequence( "1:5 -1 2:3 -2" ).unwrap().unwrap();
	assert_eq!( sequence.size(), 2 );
	assert_eq!( sequence.itemset( 0 ), &[1] );
	assert_eq!( sequence.itemset( 1 ), &[2] );
	assert_eq!( sequence.utility( 1, 0 ), 3.0 );
	assert_eq!( sequence.exact_utility(), 8.0 );
    }

    #[test]
    fn test_parse_default_utility() {
	let sequence = parse_sequence( "4 7 -1 9 -2" ).unwrap().unwrap();
	assert_eq!( sequence.itemset( 0 ), &[4, 7] );
	assert_eq!( sequence.exact_utility(), 3.0 );
    }

    #[test]
    fn test_parse_fixed_sequence_utility() {
	// the marker is conventionally written after the terminator
	let sequence = parse_sequence( "1:5 -1 2:3 -2 SUtility:20" ).unwrap().unwrap();
	assert_eq!( sequence.exact_utility(), 20.0 );

	let sequence = parse_sequence( "SUtility:20 1:5 -1 2:3 -2" ).unwrap().unwrap();
	assert_eq!( sequence.exact_utility(), 20.0 );
    }

    #[test]
    fn test_parse_blank_line() {
	assert!( parse_sequence( "   " ).unwrap().is_none() );
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
	// non-integer item
	assert!( parse_sequence( "a:5 -1 -2" ).is_err() );
	// non-positive utility
	assert!( parse_sequence( "1:0 -1 -2" ).is_err() );
	assert!( parse_sequence( "1:-3 -1 -2" ).is_err() );
	// zero is not an item
	assert!( parse_sequence( "0:5 -1 -2" ).is_err() );
	// items after the terminator
	assert!( parse_sequence( "1:5 -1 -2 2:3" ).is_err() );
	// missing terminator
	assert!( parse_sequence( "1:5 -1 2:3" ).is_err() );
	// nothing but terminators
	assert!( parse_sequence( "-1 -2" ).is_err() );
    }

    #[test]
    fn test_format_rule() {
	let rule = RuleRecord{
	    antecedent: &[1, 2],
	    consequent: &[3],
	    utility: 30.0,
	    support: 2,
	    confidence: 1.0,
	};
	assert_eq!( format_rule( &rule ), "1,2\t==> \t3\t#SUP: 2\t#CONF: 1\t#UTIL: 30" );
    }

    #[test]
    fn test_collector_keeps_rules() {
	let mut collector = RuleCollector::new();
	let rule = RuleRecord{ antecedent: &[1], consequent: &[2], utility: 8.0, support: 1, confidence: 1.0 };
	collector.accept( &rule ).unwrap();
	assert_eq!( collector.rules.len(), 1 );
	assert_eq!( collector.rules[ 0 ].antecedent, vec!( 1 ));
	assert_eq!( collector.rules[ 0 ].utility, 8.0 );
    }
}
