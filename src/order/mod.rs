//! Reading order and table structure.

mod reading;
mod table_grid;

pub use reading::{detect_columns, detect_direction, reading_order, Column, ReadingDirection};
pub use table_grid::assign_table_grid;

use std::collections::BTreeMap;

use crate::geometry::Rect;
use crate::model::Block;

/// Put the blocks of one page in reading order, assign their ids and the
/// grid coordinates of table cells.
///
/// `table_tolerance` is the edge clustering distance for table grids.
pub fn order_blocks(blocks: Vec<Block>, table_tolerance: f32) -> (ReadingDirection, Vec<Block>) {
    let boxes: Vec<Rect> = blocks.iter().map(|b| b.bbox).collect();
    let (direction, order) = reading_order(&boxes);

    let mut slots: Vec<Option<Block>> = blocks.into_iter().map(Some).collect();
    let mut ordered: Vec<Block> = order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect();

    for (index, block) in ordered.iter_mut().enumerate() {
        block.id = Block::make_id(block.block_type, block.page, index);
    }

    let mut tables: BTreeMap<u16, Vec<usize>> = BTreeMap::new();
    for (i, block) in ordered.iter().enumerate() {
        if block.is_table_cell() {
            tables.entry(block.region_id).or_default().push(i);
        }
    }
    for members in tables.values() {
        let cells: Vec<Rect> = members.iter().map(|&i| ordered[i].bbox).collect();
        for (&i, coord) in members.iter().zip(assign_table_grid(&cells, table_tolerance)) {
            ordered[i].table = Some(coord);
        }
    }

    (direction, ordered)
}
