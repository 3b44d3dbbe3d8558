#![doc = "paper-digest-core: core logic library for paper-digest."]

//! This crate holds the pipeline that turns recent arXiv papers into a dated
//! research digest: source bundle extraction, LaTeX section discovery,
//! two-pass LLM summarization, Markdown digest assembly and HTML publishing.
//! The concrete text-generation client lives in the CLI crate; everything here
//! talks to it through [`contract::TextGenerator`].
//!
//! # Usage
//! Drive a run with [`pipeline::generate_digest`] and render the result with
//! [`publish::publish_newsletter`].

pub mod archive;
pub mod config;
pub mod contract;
pub mod digest;
pub mod download;
pub mod latex;
pub mod locate;
pub mod pipeline;
pub mod publish;
pub mod sections;
pub mod summarize;
