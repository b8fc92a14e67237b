//! The ordered block sequence of an agent.
//!
//! Blocks are keyed by `block_number`. Numbers are unique and only ever
//! rewritten by an explicit [`BlockSequence::reorder`]; removing a block
//! leaves a gap.

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockUpdates};
use crate::error::{CoreError, Result};
use crate::idgen::{fresh_id, prefixes};
use crate::registry::VariableRegistry;

/// Blocks kept sorted by ascending `block_number`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Block>", into = "Vec<Block>")]
pub struct BlockSequence {
    blocks: Vec<Block>,
}

impl TryFrom<Vec<Block>> for BlockSequence {
    type Error = CoreError;

    fn try_from(blocks: Vec<Block>) -> Result<Self> {
        let mut seq = Self::new();
        for block in blocks {
            let n = block.block_number;
            seq.insert(block, Some(n))?;
        }
        Ok(seq)
    }
}

impl From<BlockSequence> for Vec<Block> {
    fn from(seq: BlockSequence) -> Self {
        seq.blocks
    }
}

impl BlockSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1 for an empty sequence, otherwise one past the highest number.
    ///
    /// Fails once the highest number is `u32::MAX`.
    pub fn next_block_number(&self) -> Result<u32> {
        match self.blocks.last() {
            None => Ok(1),
            Some(last) => last
                .block_number
                .checked_add(1)
                .ok_or(CoreError::BlockNumberExhausted),
        }
    }

    fn position(&self, number: u32) -> std::result::Result<usize, usize> {
        self.blocks.binary_search_by_key(&number, |b| b.block_number)
    }

    /// Inserts a block under `number`, or under the next free number.
    ///
    /// Returns the number the block was stored under.
    pub fn insert(&mut self, mut block: Block, number: Option<u32>) -> Result<u32> {
        let number = match number {
            Some(n) => n,
            None => self.next_block_number()?,
        };
        if number == 0 {
            return Err(CoreError::InvalidBlockNumber(number));
        }
        match self.position(number) {
            Ok(_) => Err(CoreError::DuplicateBlockNumber(number)),
            Err(idx) => {
                block.block_number = number;
                self.blocks.insert(idx, block);
                Ok(number)
            }
        }
    }

    /// Removes the block with `number`. Other numbers are unchanged.
    pub fn remove(&mut self, number: u32) -> Result<Block> {
        let idx = self
            .position(number)
            .map_err(|_| CoreError::BlockNotFound(number))?;
        Ok(self.blocks.remove(idx))
    }

    /// Merges `updates` into the block with `number`.
    pub fn update(&mut self, number: u32, updates: BlockUpdates) -> Result<&Block> {
        let block = self
            .get_mut(number)
            .ok_or(CoreError::BlockNotFound(number))?;
        updates.apply(block)?;
        Ok(block)
    }

    /// Copies a block under a fresh id and the next number.
    pub fn duplicate(&mut self, number: u32) -> Result<u32> {
        let mut copy = self
            .get(number)
            .cloned()
            .ok_or(CoreError::BlockNotFound(number))?;
        copy.id = fresh_id(prefixes::BLOCK, &copy.id);
        self.insert(copy, None)
    }

    /// Moves the block at `from` to `to` (0-based positions) and renumbers
    /// every block contiguously from 1.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.blocks.len();
        for index in [from, to] {
            if index >= len {
                return Err(CoreError::IndexOutOfRange { index, len });
            }
        }
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.block_number = i as u32 + 1;
        }
        Ok(())
    }

    /// Checks that every variable reference resolves in `variables`.
    pub fn validate_references(&self, variables: &VariableRegistry) -> Result<()> {
        for block in &self.blocks {
            for id in block.variable_refs() {
                if !variables.contains(id) {
                    return Err(CoreError::VariableNotFound(id.to_owned()));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, number: u32) -> Option<&Block> {
        self.position(number).ok().map(|i| &self.blocks[i])
    }

    pub fn get_mut(&mut self, number: u32) -> Option<&mut Block> {
        match self.position(number) {
            Ok(i) => Some(&mut self.blocks[i]),
            Err(_) => None,
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// First block (lowest number) that references `variable_id`.
    pub fn first_referencing(&self, variable_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.references(variable_id))
    }

    pub fn numbers(&self) -> Vec<u32> {
        self.blocks.iter().map(|b| b.block_number).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Block> {
        self.blocks.iter_mut()
    }

    pub fn as_slice(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl<'a> IntoIterator for &'a BlockSequence {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockKind, CodePayload};
    use crate::enums::VariableKind;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn block(name: &str) -> Block {
        Block::builder(BlockKind::Checkpoint).name(name).build()
    }

    fn seq_of(n: usize) -> BlockSequence {
        let mut seq = BlockSequence::new();
        for i in 0..n {
            seq.insert(block(&format!("b{i}")), None).unwrap();
        }
        seq
    }

    #[test]
    fn numbers_start_at_one_and_append() {
        let mut seq = BlockSequence::new();
        assert_eq!(seq.next_block_number().unwrap(), 1);
        assert_eq!(seq.insert(block("a"), None).unwrap(), 1);
        assert_eq!(seq.insert(block("b"), None).unwrap(), 2);
        assert_eq!(seq.next_block_number().unwrap(), 3);
    }

    #[test]
    fn removal_leaves_a_gap() {
        let mut seq = seq_of(3);
        seq.remove(2).unwrap();
        assert_eq!(seq.numbers(), vec![1, 3]);
        assert_eq!(seq.next_block_number().unwrap(), 4);
    }

    #[test]
    fn next_number_never_regresses_below_max() {
        let mut seq = BlockSequence::new();
        seq.insert(block("a"), Some(7)).unwrap();
        seq.insert(block("b"), Some(3)).unwrap();
        assert_eq!(seq.next_block_number().unwrap(), 8);
        seq.remove(3).unwrap();
        assert_eq!(seq.next_block_number().unwrap(), 8);
    }

    #[test]
    fn auto_number_after_max_is_an_error() {
        let mut seq = BlockSequence::new();
        assert_eq!(seq.insert(block("last"), Some(u32::MAX)).unwrap(), u32::MAX);
        assert_eq!(
            seq.next_block_number().unwrap_err(),
            CoreError::BlockNumberExhausted
        );
        assert_eq!(
            seq.insert(block("next"), None).unwrap_err(),
            CoreError::BlockNumberExhausted
        );
        assert_eq!(seq.len(), 1);
        // Explicit gaps below the maximum are still usable.
        assert_eq!(seq.insert(block("gap"), Some(5)).unwrap(), 5);
    }

    #[test]
    fn explicit_numbers_are_checked() {
        let mut seq = seq_of(2);
        assert_eq!(
            seq.insert(block("x"), Some(2)).unwrap_err(),
            CoreError::DuplicateBlockNumber(2)
        );
        assert_eq!(
            seq.insert(block("x"), Some(0)).unwrap_err(),
            CoreError::InvalidBlockNumber(0)
        );
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn iteration_is_ascending() {
        let mut seq = BlockSequence::new();
        for n in [5, 1, 9, 3] {
            seq.insert(block("x"), Some(n)).unwrap();
        }
        assert_eq!(seq.numbers(), vec![1, 3, 5, 9]);
        let via_iter: Vec<u32> = seq.iter().map(|b| b.block_number).collect();
        assert_eq!(via_iter, vec![1, 3, 5, 9]);
    }

    #[test]
    fn numbers_stay_distinct_under_churn() {
        let mut seq = BlockSequence::new();
        let mut held: HashSet<u32> = HashSet::new();
        for round in 0u32..60 {
            if round % 3 == 2 {
                let victim = seq.numbers()[(round as usize * 7) % seq.len()];
                seq.remove(victim).unwrap();
                held.remove(&victim);
            } else {
                let before_max = seq.numbers().last().copied().unwrap_or(0);
                let n = seq.insert(block("x"), None).unwrap();
                assert!(!held.contains(&n));
                assert!(n > before_max);
                held.insert(n);
            }
            let numbers = seq.numbers();
            let distinct: HashSet<u32> = numbers.iter().copied().collect();
            assert_eq!(distinct.len(), numbers.len());
        }
    }

    #[test]
    fn remove_missing_block() {
        let mut seq = seq_of(1);
        assert_eq!(seq.remove(4).unwrap_err(), CoreError::BlockNotFound(4));
    }

    #[test]
    fn update_merges_fields() {
        let mut seq = seq_of(2);
        let updated = seq
            .update(
                2,
                BlockUpdates {
                    user_prompt: Some("hi".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.user_prompt, "hi");
        assert_eq!(updated.name, "b1");
        assert_eq!(
            seq.update(9, BlockUpdates::default()).unwrap_err(),
            CoreError::BlockNotFound(9)
        );
    }

    #[test]
    fn update_rejects_kind_change() {
        let mut seq = seq_of(1);
        let err = seq
            .update(
                1,
                BlockUpdates {
                    kind: Some(BlockKind::Code(CodePayload::default())),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::KindMismatch { .. }));
    }

    #[test]
    fn duplicate_gets_fresh_id_and_next_number() {
        let mut seq = seq_of(2);
        let n = seq.duplicate(1).unwrap();
        assert_eq!(n, 3);
        let original = seq.get(1).unwrap();
        let copy = seq.get(3).unwrap();
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.name, original.name);
    }

    #[test]
    fn reorder_renumbers_contiguously() {
        let mut seq = BlockSequence::new();
        for n in [2, 5, 9] {
            seq.insert(block(&format!("n{n}")), Some(n)).unwrap();
        }
        seq.reorder(2, 0).unwrap();
        assert_eq!(seq.numbers(), vec![1, 2, 3]);
        let names: Vec<&str> = seq.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["n9", "n2", "n5"]);

        assert_eq!(
            seq.reorder(0, 3).unwrap_err(),
            CoreError::IndexOutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn validate_references_reports_missing_variable() {
        let mut vars = VariableRegistry::new();
        let id = vars.add_variable("out", VariableKind::Intermediate).unwrap().id.clone();

        let mut seq = BlockSequence::new();
        seq.insert(Block::builder(BlockKind::Checkpoint).output_variable(&id).build(), None)
            .unwrap();
        seq.validate_references(&vars).unwrap();

        seq.insert(
            Block::builder(BlockKind::Checkpoint).output_variable("var-ghost").build(),
            None,
        )
        .unwrap();
        assert_eq!(
            seq.validate_references(&vars).unwrap_err(),
            CoreError::VariableNotFound("var-ghost".into())
        );
    }

    #[test]
    fn deserialization_rejects_duplicate_numbers() {
        let a = Block::builder(BlockKind::Checkpoint).block_number(1).build();
        let b = Block::builder(BlockKind::Checkpoint).block_number(1).build();
        let json = serde_json::to_string(&vec![a, b]).unwrap();
        let err = serde_json::from_str::<BlockSequence>(&json).unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[test]
    fn deserialization_sorts_blocks() {
        let a = Block::builder(BlockKind::Checkpoint).block_number(4).build();
        let b = Block::builder(BlockKind::Checkpoint).block_number(2).build();
        let json = serde_json::to_string(&vec![a, b]).unwrap();
        let seq: BlockSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(seq.numbers(), vec![2, 4]);
    }
}
