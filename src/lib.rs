//! Opskit - command-line utilities for bootstrapping a small infrastructure stack.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── dns           # DNS record management (list/add/upsert/delete/proxy)
//! │   ├── tunnel        # Tunnel lifecycle and deployment
//! │   ├── secrets       # CI secret uploads from env files
//! │   ├── key           # SSH key generation, deployment, upload
//! │   ├── patch         # Ansible-on-Windows patcher
//! │   ├── menu          # Interactive entry point (no subcommand given)
//! │   └── output        # Styled terminal output helpers
//! ├── core/             # Provider-independent logic
//! │   ├── reconcile     # Lookup-then-write upsert contract
//! │   ├── validation    # Secret names, host literals, key formats
//! │   ├── envfile       # KEY=VALUE file parsing and discovery
//! │   └── creds         # Credential resolution (flags > env > prompt)
//! ├── cloudflare/       # DNS + tunnel provider API client
//! ├── github/           # CI secrets store API client + sealed boxes
//! ├── ssh               # Two-tier public key deployment
//! └── patcher           # Textual patch logic for the automation tool
//! ```
//!
//! Every operation is synchronous and strictly sequential: each HTTP or SSH
//! round trip completes before the next action starts, and no failure is
//! retried automatically.

pub mod cli;
pub mod cloudflare;
pub mod core;
pub mod error;
pub mod github;
pub mod patcher;
pub mod ssh;
