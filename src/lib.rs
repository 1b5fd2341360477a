/*!
# Nack!

Point-of-sale and inventory backend for bars, restaurants and night clubs
in Gabon.

## Overview

An establishment signs up, gets a seven day trial and then pays a monthly
subscription through mobile money. Once inside, the owner fills the
catalogue, opens tables, invites the team and starts taking orders.
Sending an order takes the drinks out of stock and credits the customer's
loyalty card. Events sell tickets that are scanned at the door.

## Architecture

### HTTP layer
- **Technologies**: Rust, axum, tokio
- **Key Components**:
  - Router and middleware (session, plan and admin checks)
  - Handlers grouped by area under [`api`]
  - Server-sent change feed so every device of an establishment stays in sync
  - Server-rendered menu, receipt and ticket pages

### Domain layer
- **Core Components**:
  - Catalogue and stock movements ([`inventory`])
  - Tables, orders and the order state machine ([`orders`])
  - Loyalty points ([`loyalty`])
  - Events and tickets ([`events`])
  - Team members and their access codes ([`team`])
  - Trial and subscription plans ([`subscription`])
  - Onboarding tutorial ([`tutorial`])
  - Dashboard figures ([`reports`])

### Data Persistence Layer
- Per-collection JSON documents kept in memory behind a lock ([`store`])
- Gzip compressed bincode backups ([`saving`])
- CSV and XLSX order exports ([`downloader`])

### Outside services
- Mobile-money payment links ([`payment`])
- Image hosting ([`images`])
- Address lookups ([`geocoding`])
- Push notifications ([`notifications`])
- SMTP mail ([`mailer`])

## Modules

Everything that talks HTTP, renders pages or calls another service needs
the `web` feature. The rest builds without it, which is what `nack-admin`
uses.
*/

pub mod admin;
pub mod billing;
pub mod config;
pub mod downloader;
pub mod error;
pub mod events;
pub mod inventory;
pub mod loyalty;
pub mod mailer;
pub mod menu;
pub mod models;
pub mod orders;
pub mod reports;
pub mod saving;
pub mod store;
pub mod subscription;
pub mod team;
pub mod tutorial;
pub mod validation;

#[cfg(feature = "web")]
pub mod api;
#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod geocoding;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod images;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod notifications;
#[cfg(feature = "web")]
pub mod payment;
#[cfg(feature = "web")]
pub mod receipt;
#[cfg(feature = "web")]
pub mod templates;

pub use config::Config;
pub use error::{NackError, Result};
pub use store::Store;
