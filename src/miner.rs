
use std::time::Instant;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::{Item, Utility, SequenceId, Itemvec, Sequence, SequenceDatabase};
use crate::sids::{SequenceIdList, SidRepresentation};
use crate::tables::{RightTable, RightRow, LeftTable, LeftRow};
use crate::io::{RuleSink, RuleRecord};

/// Summed sequence utilities per ordered item pair. An entry survives
/// construction only if it reaches the utility threshold, so any extension
/// whose pair is absent can be dropped without building its table.
// \todo switch to a dense matrix when the item universe is small
pub type PairUtilityMap = FxHashMap<Item, FxHashMap<Item, Utility>>;

/// Estimated utility and occurrence list of a two-item seed rule
struct SeedEstimate {
    estimate: Utility,
    sequences: Vec<SequenceId>,
}

impl SeedEstimate {
    fn new() -> SeedEstimate {
	SeedEstimate{ estimate: 0.0, sequences: Vec::new() }
    }
}

type SeedMap = FxHashMap<Item, FxHashMap<Item, SeedEstimate>>;

/// Thresholds and toggles of a mining run
#[derive( Debug, Clone )]
pub struct MinerParameters {
    /// minimum confidence of an emitted rule, within [0, 1]
    pub min_confidence: f64,
    /// minimum utility of an emitted rule; zero is replaced by 0.001 so the
    /// run does not enumerate every rule
    pub min_utility: Utility,
    /// largest antecedent an emitted rule may have
    pub max_antecedent_size: usize,
    /// largest consequent an emitted rule may have
    pub max_consequent_size: usize,
    /// cap on the iterative item removal rounds
    pub max_remove_rounds: usize,
    /// remove items whose estimated utility cannot reach the threshold
    pub prune_unpromising_items: bool,
    /// drop seed rules whose estimated utility cannot reach the threshold
    pub prune_seed_pairs: bool,
    /// physical representation of sequence id sets
    pub representation: SidRepresentation,
}

impl Default for MinerParameters {
    fn default() -> Self {
	MinerParameters{
	    min_confidence: 0.5,
	    min_utility: 0.0,
	    max_antecedent_size: 5,
	    max_consequent_size: 5,
	    max_remove_rounds: usize::MAX,
	    prune_unpromising_items: true,
	    prune_seed_pairs: true,
	    representation: SidRepresentation::Bits,
	}
    }
}

/// Counters gathered over one mining run
#[derive( Debug, Default, Clone, Serialize )]
pub struct MiningStatistics {
    /// rules handed to the sink
    pub rule_count: u64,
    /// expansion calls, a proxy for the explored part of the lattice
    pub expand_count: u64,
    /// item removal rounds that ran before mining
    pub prune_rounds: u64,
    /// sequences left after preprocessing
    pub sequence_count: usize,
    pub runtime_seconds: f64,
}

/// Mines high-utility sequential rules from a sequence database.
/// Construction validates the parameter contract; `mine` runs preprocessing
/// and the recursive expansion search, feeding every accepted rule to the
/// sink.
pub struct RuleMiner {
    parameters: MinerParameters,
    /// threshold with the zero substitution applied
    min_utility: Utility,
    statistics: MiningStatistics,
}

impl RuleMiner {

    pub fn new( parameters: MinerParameters ) -> Result<RuleMiner, String> {
	if parameters.max_antecedent_size < 1 || parameters.max_consequent_size < 1 {
	    return Result::Err( "rule side size caps must be at least 1".to_string() );
	}
	if !(0.0 ..= 1.0).contains( &parameters.min_confidence ) {
	    return Result::Err( format!( "minimum confidence must lie in [0, 1], got {}", parameters.min_confidence ));
	}
	if !parameters.min_utility.is_finite() || parameters.min_utility < 0.0 {
	    return Result::Err( format!( "minimum utility must be non-negative, got {}", parameters.min_utility ));
	}
	let min_utility = if parameters.min_utility == 0.0 { 0.001 } else { parameters.min_utility };
	Result::Ok( RuleMiner{
	    parameters,
	    min_utility,
	    statistics: MiningStatistics::default(),
	})
    }

    /// Runs the full pipeline on the database and streams rules to the sink.
    /// The database is consumed because preprocessing rewrites it.
    pub fn mine <S: RuleSink> ( &mut self, mut database: SequenceDatabase, sink: &mut S ) -> Result<(), String> {
	let start = Instant::now();
	self.statistics = MiningStatistics::default();

	if self.parameters.prune_unpromising_items {
	    self.prune_database( &mut database );
	}
	self.statistics.sequence_count = database.len();

	let item_sequences = self.index_item_sequences( &database );
	let (co_occurrence, seeds) = self.collect_pair_estimates( &database );
	info!( "mining {} sequences over {} items", database.len(), item_sequences.len() );

	let mut search = Search{
	    database: &database,
	    co_occurrence: &co_occurrence,
	    item_sequences: &item_sequences,
	    min_utility: self.min_utility,
	    min_confidence: self.parameters.min_confidence,
	    max_antecedent_size: self.parameters.max_antecedent_size,
	    max_consequent_size: self.parameters.max_consequent_size,
	    sink,
	    statistics: &mut self.statistics,
	};
	search.run( &seeds )?;

	self.statistics.runtime_seconds = start.elapsed().as_secs_f64();
	info!(
	    "found {} rules after {} expansions in {:.3} s",
	    self.statistics.rule_count, self.statistics.expand_count, self.statistics.runtime_seconds,
	);
	Result::Ok( () )
    }

    pub fn statistics( &self ) -> &MiningStatistics {
	&self.statistics
    }

    /// Iteratively removes items whose estimated utility stays below the
    /// threshold. Removing occurrences shrinks sequence utilities, which in
    /// turn shrinks the estimates of the surviving items, so the rounds keep
    /// going until nothing moves or the cap is hit.
    fn prune_database( &mut self, database: &mut SequenceDatabase ) {
	let mut estimates = estimate_item_utilities( database );
	let promising_before = estimates.len();
	estimates.retain( |_, estimate| *estimate >= self.min_utility );
	let mut remove_count = promising_before - estimates.len();

	let mut rounds: u64 = 0;
	while remove_count > 0 && (rounds as usize) < self.parameters.max_remove_rounds {
	    rounds += 1;
	    remove_count = 0;
	    for sequence in database.iter_mut() {
		let removed = sequence.remove_items_where( |item| !estimates.contains_key( &item ));
		if sequence.is_empty() {
		    continue;
		}
		// every survivor in the sequence is charged the full utility
		// removed from it, a loose but safe discount
		for item in sequence.items() {
		    let shrunk = match estimates.get( &item ) {
			Some( estimate ) => estimate - removed,
			None => continue,
		    };
		    if shrunk < self.min_utility {
			estimates.remove( &item );
			remove_count += 1;
		    } else {
			estimates.insert( item, shrunk );
		    }
		}
	    }
	    database.remove_empty_sequences();
	    debug!( "removal round {} dropped {} items", rounds, remove_count );
	}
	self.statistics.prune_rounds = rounds;
    }

    /// Builds the item to sequence ids index. Ids are final at this point.
    fn index_item_sequences( &self, database: &SequenceDatabase ) -> FxHashMap<Item, SequenceIdList> {
	let representation = self.parameters.representation;
	let mut index: FxHashMap<Item, SequenceIdList> = FxHashMap::default();
	for (sid, sequence) in database.iter().enumerate() {
	    for item in sequence.items() {
		index.entry( item )
		    .or_insert_with( || SequenceIdList::new( representation ))
		    .add( sid );
	    }
	}
	index
    }

    /// One pass over the database building the pair co-occurrence estimates
    /// and the seed rules, then dropping whatever cannot reach the threshold
    fn collect_pair_estimates( &self, database: &SequenceDatabase ) -> (PairUtilityMap, SeedMap) {
	let mut pairs: PairUtilityMap = FxHashMap::default();
	let mut seeds: SeedMap = FxHashMap::default();

	for (sid, sequence) in database.iter().enumerate() {
	    let sequence_utility = sequence.exact_utility();
	    for first in 0 .. sequence.size() {
		let itemset = sequence.itemset( first );
		for position in 0 .. itemset.len() {
		    let item = itemset[ position ];
		    // pairs within one itemset feed the co-occurrence map only
		    for later in position + 1 .. itemset.len() {
			add_pair_utility( &mut pairs, item, itemset[ later ], sequence_utility );
		    }
		    // pairs across itemsets also seed one-by-one rules
		    for second in first + 1 .. sequence.size() {
			for &later_item in sequence.itemset( second ) {
			    add_pair_utility( &mut pairs, item, later_item, sequence_utility );
			    let seed = seeds.entry( item ).or_default()
				.entry( later_item ).or_insert_with( SeedEstimate::new );
			    if seed.sequences.last() != Some( &sid ) {
				seed.estimate += sequence_utility;
				seed.sequences.push( sid );
			    }
			}
		    }
		}
	    }
	}

	for successors in pairs.values_mut() {
	    successors.retain( |_, estimate| *estimate >= self.min_utility );
	}
	if self.parameters.prune_seed_pairs {
	    for successors in seeds.values_mut() {
		successors.retain( |_, seed| seed.estimate >= self.min_utility );
	    }
	}
	(pairs, seeds)
    }
}

fn estimate_item_utilities( database: &SequenceDatabase ) -> FxHashMap<Item, Utility> {
    let mut estimates: FxHashMap<Item, Utility> = FxHashMap::default();
    for sequence in database.iter() {
	for item in sequence.items() {
	    *estimates.entry( item ).or_insert( 0.0 ) += sequence.exact_utility();
	}
    }
    estimates
}

fn add_pair_utility( pairs: &mut PairUtilityMap, first: Item, second: Item, utility: Utility ) {
    *pairs.entry( first ).or_default().entry( second ).or_insert( 0.0 ) += utility;
}

/// The recursive search over the rule lattice. Everything shared is frozen
/// before the search starts; only the sink and the counters are mutable.
struct Search<'a, S: RuleSink> {
    database: &'a SequenceDatabase,
    co_occurrence: &'a PairUtilityMap,
    item_sequences: &'a FxHashMap<Item, SequenceIdList>,
    min_utility: Utility,
    min_confidence: f64,
    max_antecedent_size: usize,
    max_consequent_size: usize,
    sink: &'a mut S,
    statistics: &'a mut MiningStatistics,
}

impl <'a, S: RuleSink> Search<'a, S> {

    /// Builds the table of every surviving seed rule and expands from there
    fn run( &mut self, seeds: &SeedMap ) -> Result<(), String> {
	let item_sequences = self.item_sequences;
	for (x, consequents) in seeds {
	    let x_sequences = item_sequences.get( x ).expect( "seed items are indexed" );
	    let support_x = x_sequences.size();
	    for (y, seed) in consequents {
		let mut table = RightTable::new();
		for sid in &seed.sequences {
		    if let Some( row ) = build_seed_row( self.database.get( *sid ), *x, *y, *sid ) {
			table.push( row );
		    }
		}

		let confidence = seed.sequences.len() as f64 / support_x as f64;
		let antecedent = vec!( *x );
		let consequent = vec!( *y );
		if table.total_utility >= self.min_utility && confidence >= self.min_confidence {
		    self.emit( &antecedent, &consequent, table.total_utility, seed.sequences.len(), confidence )?;
		}
		if table.right_estimate >= self.min_utility && self.max_consequent_size > 1 {
		    self.expand_right( &table, &antecedent, &consequent, x_sequences )?;
		}
		if table.left_estimate >= self.min_utility && self.max_antecedent_size > 1 {
		    self.expand_first_left( &table, &antecedent, &consequent, x_sequences )?;
		}
	    }
	}
	Result::Ok( () )
    }

    /// Grows the consequent by every viable item larger than its current
    /// largest one, building the child tables row by row
    fn expand_right( &mut self, table: &RightTable, antecedent: &[Item], consequent: &[Item], antecedent_sequences: &SequenceIdList ) -> Result<(), String> {
	self.statistics.expand_count += 1;

	let largest_antecedent = *antecedent.last().expect( "rules have a non-empty antecedent" );
	let largest_consequent = *consequent.last().expect( "rules have a non-empty consequent" );

	// child tables keyed by the appended item
	let mut children: FxHashMap<Item, RightTable> = FxHashMap::default();
	// summed row bounds per candidate item
	let mut summed_estimates: FxHashMap<Item, Utility> = FxHashMap::default();
	// bound mass of the rows not consumed yet
	let mut remaining = table.right_estimate;

	for row in &table.rows {
	    remaining -= row.right_estimate;
	    if row.u_left + row.u_right + row.u_left_right == 0.0 {
		continue;
	    }
	    let sequence = self.database.get( row.sequence );

	    // from the beta itemset on, larger items extend the consequent in place
	    for current in row.beta_itemset .. sequence.size() {
		let itemset = sequence.itemset( current );
		for position in 0 .. itemset.len() {
		    let item = itemset[ position ];
		    if item <= largest_consequent {
			continue;
		    }
		    if !self.pair_promising( largest_antecedent, item ) {
			continue;
		    }
		    let summed = summed_estimates.entry( item ).or_insert( 0.0 );
		    *summed += row.right_estimate;
		    if *summed + remaining < self.min_utility {
			continue;
		    }

		    let profit = sequence.utility( current, position );
		    let mut child = RightRow::new( row.sequence );
		    child.utility = row.utility + profit;
		    child.u_left = row.u_left;
		    child.u_left_right = row.u_left_right;
		    // right candidates smaller than the new item can no longer extend
		    child.u_right = row.u_right - profit
			- smaller_right_candidates_after( sequence, row.beta_itemset, largest_consequent, item );
		    child.alpha_itemset = row.alpha_itemset;
		    child.beta_itemset = row.beta_itemset;
		    child.compute_estimates();
		    children.entry( item ).or_default().push( child );
		}
	    }

	    // between alpha and beta the classification depends on both rule ends;
	    // walking the itemsets towards alpha keeps the window sums current
	    let mut left_sum = 0.0;
	    let mut left_right_sum = 0.0;
	    for current in (row.alpha_itemset + 1 .. row.beta_itemset).rev() {
		let itemset = sequence.itemset( current );
		for position in 0 .. itemset.len() {
		    let item = itemset[ position ];
		    let profit = sequence.utility( current, position );
		    let is_left = item > largest_antecedent && item < largest_consequent;
		    let is_right = item > largest_consequent && item < largest_antecedent;
		    let is_left_right = item > largest_antecedent && item > largest_consequent;

		    if is_left {
			left_sum += profit;
		    } else if is_right {
			if !self.pair_promising( largest_antecedent, item ) {
			    continue;
			}
			let summed = summed_estimates.entry( item ).or_insert( 0.0 );
			*summed += row.right_estimate;
			if *summed + remaining < self.min_utility {
			    continue;
			}

			let mut child = RightRow::new( row.sequence );
			child.utility = row.utility + profit;
			child.u_left = row.u_left - left_sum;
			child.u_left_right = row.u_left_right - left_right_sum;
			// the window between the new and the old beta changes roles:
			// smaller right candidates drop out, larger two-sided ones
			// become right candidates
			let (smaller_right, larger_shared) =
			    reclassified_right_candidates( sequence, current, row.beta_itemset, largest_antecedent, largest_consequent, item );
			child.u_right = row.u_right - profit + larger_shared - smaller_right;
			child.alpha_itemset = row.alpha_itemset;
			child.beta_itemset = current;
			child.compute_estimates();
			children.entry( item ).or_default().push( child );
		    } else if is_left_right {
			if !self.pair_promising( largest_antecedent, item ) {
			    left_right_sum += profit;
			    continue;
			}
			let summed = summed_estimates.entry( item ).or_insert( 0.0 );
			*summed += row.right_estimate;
			if *summed + remaining < self.min_utility {
			    left_right_sum += profit;
			    continue;
			}

			let mut child = RightRow::new( row.sequence );
			child.utility = row.utility + profit;
			child.u_left = row.u_left - left_sum;
			child.u_left_right = row.u_left_right - profit - left_right_sum;
			// later candidates in this window account for this item too
			left_right_sum += profit;
			child.u_right = row.u_right
			    - smaller_right_candidates_between( sequence, current, row.beta_itemset, largest_antecedent, largest_consequent, item );
			child.alpha_itemset = row.alpha_itemset;
			child.beta_itemset = current;
			child.compute_estimates();
			children.entry( item ).or_default().push( child );
		    }
		}
	    }
	}

	for (item, child_table) in &children {
	    let mut extended: Itemvec = consequent.to_vec();
	    extended.push( *item );

	    let confidence = child_table.support() as f64 / antecedent_sequences.size() as f64;
	    if child_table.total_utility >= self.min_utility && confidence >= self.min_confidence {
		self.emit( antecedent, &extended, child_table.total_utility, child_table.support(), confidence )?;
	    }
	    if child_table.left_estimate >= self.min_utility && antecedent.len() < self.max_antecedent_size {
		self.expand_first_left( child_table, antecedent, &extended, antecedent_sequences )?;
	    }
	    if child_table.right_estimate >= self.min_utility && extended.len() < self.max_consequent_size {
		self.expand_right( child_table, antecedent, &extended, antecedent_sequences )?;
	    }
	}
	Result::Ok( () )
    }

    /// First antecedent extension of a rule. Works on the full table because
    /// the consequent-side reservoirs still exist at this point; afterwards
    /// the recursion continues on the slimmer left tables.
    fn expand_first_left( &mut self, table: &RightTable, antecedent: &[Item], consequent: &[Item], antecedent_sequences: &SequenceIdList ) -> Result<(), String> {
	self.statistics.expand_count += 1;

	let largest_antecedent = *antecedent.last().expect( "rules have a non-empty antecedent" );
	let largest_consequent = *consequent.last().expect( "rules have a non-empty consequent" );

	let mut children: FxHashMap<Item, LeftTable> = FxHashMap::default();
	let mut summed_estimates: FxHashMap<Item, Utility> = FxHashMap::default();
	let mut remaining = table.left_estimate;

	for row in &table.rows {
	    remaining -= row.left_estimate;
	    // candidates may sit in either left-capable reservoir
	    if row.u_left + row.u_left_right == 0.0 {
		continue;
	    }
	    let sequence = self.database.get( row.sequence );

	    for current in 0 .. row.beta_itemset {
		let itemset = sequence.itemset( current );
		for position in 0 .. itemset.len() {
		    let item = itemset[ position ];
		    if item <= largest_antecedent {
			continue;
		    }
		    if !self.pair_promising( item, largest_consequent ) {
			continue;
		    }
		    let summed = summed_estimates.entry( item ).or_insert( 0.0 );
		    *summed += row.left_estimate;
		    if *summed + remaining < self.min_utility {
			continue;
		    }

		    let profit = sequence.utility( current, position );
		    let mut child = LeftRow::new( row.sequence );
		    child.utility = row.utility + profit;
		    // only left extensions remain, so the shared reservoir
		    // drains into the left one
		    child.u_left = row.u_left + row.u_left_right - profit
			- smaller_left_candidates_before( sequence, row.beta_itemset, largest_antecedent, item );
		    child.compute_estimate();
		    children.entry( item ).or_default().push( child );
		}
	    }
	}

	// beta survives every further left expansion, so it moves into a
	// side table built on demand from the parent rows
	let mut beta_positions: Option<FxHashMap<SequenceId, usize>> = None;

	let item_sequences = self.item_sequences;
	for (item, child_table) in &children {
	    let should_expand = child_table.left_estimate >= self.min_utility
		&& antecedent.len() + 1 < self.max_antecedent_size;
	    let high_utility = child_table.total_utility >= self.min_utility;
	    if !should_expand && !high_utility {
		continue;
	    }

	    // the antecedent changed, so its sequence set must be recomputed
	    let candidate_sequences = item_sequences.get( item ).expect( "candidate items are indexed" );
	    let extended_sequences = antecedent_sequences.intersection( candidate_sequences );
	    let confidence = child_table.support() as f64 / extended_sequences.size() as f64;

	    let mut extended: Itemvec = antecedent.to_vec();
	    extended.push( *item );

	    if high_utility && confidence >= self.min_confidence {
		self.emit( &extended, consequent, child_table.total_utility, child_table.support(), confidence )?;
	    }
	    if should_expand {
		let beta = beta_positions.get_or_insert_with( || {
		    table.rows.iter().map( |row| (row.sequence, row.beta_itemset) ).collect()
		});
		self.expand_second_left( child_table, &extended, consequent, &extended_sequences, beta )?;
	    }
	}
	Result::Ok( () )
    }

    /// Further antecedent extensions, with beta looked up in the side table
    fn expand_second_left( &mut self, table: &LeftTable, antecedent: &[Item], consequent: &[Item], antecedent_sequences: &SequenceIdList, beta_positions: &FxHashMap<SequenceId, usize> ) -> Result<(), String> {
	self.statistics.expand_count += 1;

	let largest_antecedent = *antecedent.last().expect( "rules have a non-empty antecedent" );
	let largest_consequent = *consequent.last().expect( "rules have a non-empty consequent" );

	let mut children: FxHashMap<Item, LeftTable> = FxHashMap::default();
	let mut summed_estimates: FxHashMap<Item, Utility> = FxHashMap::default();
	let mut remaining = table.left_estimate;

	for row in &table.rows {
	    remaining -= row.left_estimate;
	    if row.u_left == 0.0 {
		continue;
	    }
	    let sequence = self.database.get( row.sequence );
	    let beta_itemset = *beta_positions.get( &row.sequence ).expect( "beta positions cover every row" );

	    for current in 0 .. beta_itemset {
		let itemset = sequence.itemset( current );
		for position in 0 .. itemset.len() {
		    let item = itemset[ position ];
		    if item <= largest_antecedent {
			continue;
		    }
		    if !self.pair_promising( item, largest_consequent ) {
			continue;
		    }
		    let summed = summed_estimates.entry( item ).or_insert( 0.0 );
		    *summed += row.left_estimate;
		    if *summed + remaining < self.min_utility {
			continue;
		    }

		    let profit = sequence.utility( current, position );
		    let mut child = LeftRow::new( row.sequence );
		    child.utility = row.utility + profit;
		    child.u_left = row.u_left - profit
			- smaller_left_candidates_before( sequence, beta_itemset, largest_antecedent, item );
		    child.compute_estimate();
		    children.entry( item ).or_default().push( child );
		}
	    }
	}

	let item_sequences = self.item_sequences;
	for (item, child_table) in &children {
	    let should_expand = child_table.left_estimate >= self.min_utility
		&& antecedent.len() + 1 < self.max_antecedent_size;
	    let high_utility = child_table.total_utility >= self.min_utility;
	    if !should_expand && !high_utility {
		continue;
	    }

	    let candidate_sequences = item_sequences.get( item ).expect( "candidate items are indexed" );
	    let extended_sequences = antecedent_sequences.intersection( candidate_sequences );
	    let confidence = child_table.support() as f64 / extended_sequences.size() as f64;

	    let mut extended: Itemvec = antecedent.to_vec();
	    extended.push( *item );

	    if high_utility && confidence >= self.min_confidence {
		self.emit( &extended, consequent, child_table.total_utility, child_table.support(), confidence )?;
	    }
	    if should_expand {
		self.expand_second_left( child_table, &extended, consequent, &extended_sequences, beta_positions )?;
	    }
	}
	Result::Ok( () )
    }

    fn pair_promising( &self, first: Item, second: Item ) -> bool {
	self.co_occurrence.get( &first )
	    .map_or( false, |successors| successors.contains_key( &second ))
    }

    fn emit( &mut self, antecedent: &[Item], consequent: &[Item], utility: Utility, support: usize, confidence: f64 ) -> Result<(), String> {
	self.statistics.rule_count += 1;
	self.sink.accept( &RuleRecord{ antecedent, consequent, utility, support, confidence })
    }
}

/// Builds the table row of a seed rule x -> y for one sequence, or None when
/// the rule does not occur in it. The scan pins down alpha and beta and
/// splits the utility of the remaining items into the three reservoirs.
fn build_seed_row( sequence: &Sequence, x: Item, y: Item, sid: SequenceId ) -> Option<RightRow> {
    let mut row = RightRow::new( sid );

    // first occurrence of x, walking forward; larger items seen on the way
    // could extend the antecedent
    let mut alpha: Option<(usize, usize)> = None;
    'alpha: for current in 0 .. sequence.size() {
	let itemset = sequence.itemset( current );
	for position in 0 .. itemset.len() {
	    let item = itemset[ position ];
	    if item == x {
		row.utility += sequence.utility( current, position );
		alpha = Some( (current, position) );
		break 'alpha;
	    }
	    if item > x {
		row.u_left += sequence.utility( current, position );
	    }
	}
    }
    let (alpha_itemset, alpha_position) = alpha?;
    row.alpha_itemset = alpha_itemset;

    // last occurrence of y after alpha, walking backward; larger items seen
    // on the way could extend the consequent
    let mut beta: Option<(usize, usize)> = None;
    'beta: for current in (alpha_itemset + 1 .. sequence.size()).rev() {
	let itemset = sequence.itemset( current );
	for position in (0 .. itemset.len()).rev() {
	    let item = itemset[ position ];
	    if item == y {
		row.utility += sequence.utility( current, position );
		beta = Some( (current, position) );
		break 'beta;
	    }
	    if item > y {
		row.u_right += sequence.utility( current, position );
	    }
	}
    }
    let (beta_itemset, beta_position) = beta?;
    row.beta_itemset = beta_itemset;

    // the rest of the alpha itemset can only extend the antecedent
    for position in alpha_position + 1 .. sequence.itemset( alpha_itemset ).len() {
	row.u_left += sequence.utility( alpha_itemset, position );
    }

    // strictly between alpha and beta an item may serve either side
    for current in alpha_itemset + 1 .. beta_itemset {
	let itemset = sequence.itemset( current );
	for position in 0 .. itemset.len() {
	    let item = itemset[ position ];
	    if item > x && item > y {
		row.u_left_right += sequence.utility( current, position );
	    } else if item > x {
		row.u_left += sequence.utility( current, position );
	    } else if item > y {
		row.u_right += sequence.utility( current, position );
	    }
	}
    }

    // items strictly before y in the beta itemset count for the right side
    for position in 0 .. beta_position {
	let item = sequence.itemset( beta_itemset )[ position ];
	if item > y {
	    row.u_right += sequence.utility( beta_itemset, position );
	}
    }

    row.compute_estimates();
    Some( row )
}

/// Utility of right candidates after the beta itemset that fall below the
/// appended item and so stop being candidates
fn smaller_right_candidates_after( sequence: &Sequence, beta_itemset: usize, largest_consequent: Item, item: Item ) -> Utility {
    let mut sum = 0.0;
    for scan in beta_itemset .. sequence.size() {
	let scanned = sequence.itemset( scan );
	for position in (0 .. scanned.len()).rev() {
	    let other = scanned[ position ];
	    if other <= largest_consequent {
		break;
	    }
	    if other < item {
		sum += sequence.utility( scan, position );
	    }
	}
    }
    sum
}

/// Window between the new and the old beta when a right-only item anchors the
/// new beta: right candidates below the item leave the reservoir, two-sided
/// candidates above it enter it
fn reclassified_right_candidates( sequence: &Sequence, new_beta: usize, old_beta: usize, largest_antecedent: Item, largest_consequent: Item, item: Item ) -> (Utility, Utility) {
    let mut smaller_right = 0.0;
    let mut larger_shared = 0.0;
    for scan in new_beta .. old_beta {
	let scanned = sequence.itemset( scan );
	for position in 0 .. scanned.len() {
	    let other = scanned[ position ];
	    let other_right = other > largest_consequent && other < largest_antecedent;
	    let other_shared = other > largest_antecedent && other > largest_consequent;
	    if other_right && other < item {
		smaller_right += sequence.utility( scan, position );
	    } else if other_shared && other > item {
		larger_shared += sequence.utility( scan, position );
	    }
	}
    }
    (smaller_right, larger_shared)
}

/// Utility of right-only candidates up to the appended item in the window
/// between the new and the old beta
fn smaller_right_candidates_between( sequence: &Sequence, new_beta: usize, old_beta: usize, largest_antecedent: Item, largest_consequent: Item, item: Item ) -> Utility {
    let mut sum = 0.0;
    for scan in new_beta .. old_beta {
	let scanned = sequence.itemset( scan );
	for position in 0 .. scanned.len() {
	    let other = scanned[ position ];
	    if other > item {
		break;
	    }
	    if other > largest_consequent && other < largest_antecedent {
		sum += sequence.utility( scan, position );
	    }
	}
    }
    sum
}

/// Utility of left candidates before beta that fall below the appended item
fn smaller_left_candidates_before( sequence: &Sequence, beta_itemset: usize, largest_antecedent: Item, item: Item ) -> Utility {
    let mut sum = 0.0;
    for scan in 0 .. beta_itemset {
	let scanned = sequence.itemset( scan );
	for position in (0 .. scanned.len()).rev() {
	    let other = scanned[ position ];
	    if other <= largest_antecedent {
		break;
	    }
	    if other < item {
		sum += sequence.utility( scan, position );
	    }
	}
    }
    sum
}
