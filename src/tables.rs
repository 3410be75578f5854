
use crate::{SequenceId, Utility};

/// One sequence's view of a rule during right or left expansion.
/// The three reservoirs split the remaining utility by which side of the
/// rule a future item could still extend.
pub struct RightRow {
    /// sequence the rule occurs in
    pub sequence: SequenceId,
    /// exact utility of the rule in this sequence
    pub utility: Utility,
    /// utility of items only usable to grow the antecedent
    pub u_left: Utility,
    /// utility of items usable on either side
    pub u_left_right: Utility,
    /// utility of items only usable to grow the consequent
    pub u_right: Utility,
    /// itemset completing the antecedent occurrence
    pub alpha_itemset: usize,
    /// itemset completing the consequent occurrence
    pub beta_itemset: usize,
    /// upper bound on any left extension of the rule in this sequence
    pub left_estimate: Utility,
    /// upper bound on any right extension of the rule in this sequence
    pub right_estimate: Utility,
}

impl RightRow {

    pub fn new( sequence: SequenceId ) -> RightRow {
	RightRow{
	    sequence,
	    utility: 0.0,
	    u_left: 0.0,
	    u_left_right: 0.0,
	    u_right: 0.0,
	    alpha_itemset: 0,
	    beta_itemset: 0,
	    left_estimate: 0.0,
	    right_estimate: 0.0,
	}
    }

    /// Derives the expansion bounds from the reservoirs.
    /// A bound stays zero when its reservoirs are exhausted, which is what
    /// stops the recursion on that side.
    pub fn compute_estimates( &mut self ) {
	if self.u_left_right != 0.0 {
	    self.left_estimate = self.utility + self.u_left_right + self.u_left;
	    self.right_estimate = self.utility + self.u_left_right + self.u_left + self.u_right;
	} else {
	    if self.u_left != 0.0 {
		self.left_estimate = self.utility + self.u_left;
	    }
	    if self.u_right != 0.0 {
		self.right_estimate = self.utility + self.u_right + self.u_left;
	    }
	}
    }
}

/// Per-rule table with one row per sequence containing the rule
pub struct RightTable {
    pub rows: Vec<RightRow>,
    /// sum of the row utilities
    pub total_utility: Utility,
    /// sum of the row left bounds
    pub left_estimate: Utility,
    /// sum of the row right bounds
    pub right_estimate: Utility,
}

impl RightTable {

    pub fn new() -> RightTable {
	RightTable{ rows: Vec::new(), total_utility: 0.0, left_estimate: 0.0, right_estimate: 0.0 }
    }

    /// Appends a row and folds it into the table aggregates
    pub fn push( &mut self, row: RightRow ) {
	self.total_utility += row.utility;
	self.left_estimate += row.left_estimate;
	self.right_estimate += row.right_estimate;
	self.rows.push( row );
    }

    /// Number of sequences containing the rule
    pub fn support( &self ) -> usize {
	self.rows.len()
    }
}

/// Row of the slimmer table used once only left expansion remains.
/// The consequent is frozen at this point, so there is no right reservoir
/// and the beta positions live in a map owned by the caller.
pub struct LeftRow {
    pub sequence: SequenceId,
    pub utility: Utility,
    pub u_left: Utility,
    pub left_estimate: Utility,
}

impl LeftRow {

    pub fn new( sequence: SequenceId ) -> LeftRow {
	LeftRow{ sequence, utility: 0.0, u_left: 0.0, left_estimate: 0.0 }
    }

    pub fn compute_estimate( &mut self ) {
	if self.u_left != 0.0 {
	    self.left_estimate = self.utility + self.u_left;
	}
    }
}

pub struct LeftTable {
    pub rows: Vec<LeftRow>,
    pub total_utility: Utility,
    pub left_estimate: Utility,
}

impl LeftTable {

    pub fn new() -> LeftTable {
	LeftTable{ rows: Vec::new(), total_utility: 0.0, left_estimate: 0.0 }
    }

    pub fn push( &mut self, row: LeftRow ) {
	self.total_utility += row.utility;
	self.left_estimate += row.left_estimate;
	self.rows.push( row );
    }

    pub fn support( &self ) -> usize {
	self.rows.len()
    }
}

impl Default for RightTable {
    fn default() -> Self {
	RightTable::new()
    }
}

impl Default for LeftTable {
    fn default() -> Self {
	LeftTable::new()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_estimates_with_shared_reservoir() {
	let mut row = RightRow::new( 0 );
	row.utility = 10.0;
	row.u_left = 2.0;
	row.u_left_right = 3.0;
	row.u_right = 4.0;
	row.compute_estimates();
	assert_eq!( row.left_estimate, 15.0 );
	assert_eq!( row.right_estimate, 19.0 );
    }

    #[test]
    fn test_estimates_without_shared_reservoir() {
	let mut row = RightRow::new( 0 );
	row.utility = 10.0;
	row.u_left = 2.0;
	row.u_right = 4.0;
	row.compute_estimates();
	assert_eq!( row.left_estimate, 12.0 );
	// the left reservoir still counts for the right bound
	assert_eq!( row.right_estimate, 16.0 );
    }

    #[test]
    fn test_estimates_stay_zero_on_empty_reservoirs() {
	let mut row = RightRow::new( 0 );
	row.utility = 10.0;
	row.compute_estimates();
	assert_eq!( row.left_estimate, 0.0 );
	assert_eq!( row.right_estimate, 0.0 );

	let mut left = LeftRow::new( 0 );
	left.utility = 10.0;
	left.compute_estimate();
	assert_eq!( left.left_estimate, 0.0 );
    }

    #[test]
    fn test_table_aggregates() {
	let mut table = RightTable::new();
	for utility in [5.0, 7.0] {
	    let mut row = RightRow::new( 0 );
	    row.utility = utility;
	    row.u_right = 1.0;
	    row.compute_estimates();
	    table.push( row );
	}
	assert_eq!( table.support(), 2 );
	assert_eq!( table.total_utility, 12.0 );
	assert_eq!( table.left_estimate, 0.0 );
	assert_eq!( table.right_estimate, 14.0 );
    }
}
