/*!
Command handlers for the CLI

- `ask`: send one query and stream the answer
- `logs`: inspect the request ledger

Handlers stay thin: they wire configuration into the library components
and render results.
*/

pub mod ask;
pub mod logs;
