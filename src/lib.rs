/*!
# Quotation Desk

Back-end service for an internal sales-activity tool, built in Rust.

## Overview

The centre of the crate is the quotation document builder: a JSON quotation request
(client details, line items, VAT selection and total) is turned into a formatted Excel
workbook, with each line item's free-text description rendered as a label/value block
and its reference photo fetched and embedded next to it.

Around the builder sit the pieces the sales tool needs on the server side:

- Activity persistence with field validation and a short-lived result cache
- History lookup by activity reference numbers
- A realtime change feed, plus a reusable reducer that keeps an id-keyed list in sync
- Duplicate company detection for new accounts

## Architecture

### Document Layer
- **description**: Parses HTML / `||`-separated descriptions into label/value rows
- **quotation**: Request model, in-memory sheet model and the document builder
- **terms**: Trailer template (VAT choice, total, delivery/payment terms, signatories)
- **photos**: Reference photo fetching with bounded concurrency and per-fetch timeouts
- **downloader**: Writes the sheet model out as XLSX bytes

### Data Layer
- **activity**: Activity records and their validation rules
- **store**: Storage trait with an in-memory implementation
- **cache**: Time-limited response cache
- **realtime**: Change feed and keyed-list synchronizer
- **company**: Company name normalization and fuzzy duplicate matching

### Web Layer (feature `web`)
- **config**: Command-line / environment configuration
- **app**: Routing and handlers

## REST API Endpoints

- `POST /api/quotation` - Builds and downloads a quotation workbook
- `POST /api/activities` - Validates and stores an activity
- `GET /api/activities/history` - Looks up activities by reference numbers
- `DELETE /api/activities/{id}` - Removes an activity
- `GET /api/activities/stream` - Server-sent change events for one owner
- `GET /api/accounts/check-duplicate` - Fuzzy duplicate check for a company name
- `POST /api/accounts` - Registers an account
*/

pub mod activity;
pub mod cache;
pub mod company;
pub mod description;
pub mod downloader;
pub mod error;
pub mod photos;
pub mod quotation;
pub mod realtime;
pub mod store;
pub mod terms;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;

pub use description::{DescriptionRow, description_cell_text, parse_description, render_rows};
pub use error::AppError;
pub use quotation::{LineItem, QuotationBuilder, QuotationDocument, QuotationRequest, QuotationSheet};
