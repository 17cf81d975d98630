/*!
# Weekly Boss Material Tracker

A single-user web page for tracking the crafting materials dropped by a
game's weekly bosses, backed by two spreadsheet files.

## Overview

The counts file holds one column per boss. Its first three rows are the
material slots and a row labelled `总计` holds each boss's total. The reference
file lists (boss full name, material name) pairs, three consecutive rows per
boss, in the same order as the counts columns.

Every request reloads both files, so the page always reflects what is on disk.

## Features

- Top-3 recommendation of the bosses with the fewest materials, skipping the
  ones already logged this week
- Weekly progress (three distinct bosses) kept per browser session, with a
  reset once the week is complete
- Loot entry: add a kill's drops to a boss and recompute its total
- Inventory editor: overwrite any stored quantity; every change is saved
  immediately, one write per form submission
- `.xlsx` and `.csv` storage, chosen by file extension (`.xls`/`.xlsm` are
  read but not written)

## Modules

- **config**: file paths, labels and the bind address
- **table**: counts and reference tables, totals-row lookup by label
- **loader**: reads both files, applies the column alias fix
- **saving**: writes the counts table back atomically
- **mapping**: pairs boss columns with display and material names
- **recommend**: lowest-total bosses not yet logged
- **progress**: the weekly completion set
- **session**: per-session context and flash notices
- **tracker**: loot entry and inventory edits over the files
- **page**, **app**: HTML rendering and routes (feature `web`)

## Routes

- `GET /` - the tracker page
- `POST /loot` - log a kill
- `POST /inventory` - apply direct edits
- `POST /reset` - start a new week
- `GET /api/summary` - progress, recommendations and counts as JSON
*/

pub mod config;
pub mod error;
pub mod loader;
pub mod mapping;
pub mod progress;
pub mod recommend;
pub mod saving;
pub mod session;
pub mod table;
pub mod tracker;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod page;

pub use error::{TrackerError, TrackerWarning};
pub use tracker::{InventoryEdit, LootEntry, Tracker};
