//! CLI definitions for registry-mirror
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "registry-mirror",
    version,
    about = "Declarative container registry provisioning and image mirroring",
    long_about = "Creates one registry per logical image, pulls the upstream image at a tag,\n\
                  retags it for the registry and pushes it. Safe to run repeatedly."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Stack configuration file (default: ./registry-mirror.yaml if present)
    #[arg(long, global = true, env = "REGISTRY_MIRROR_CONFIG")]
    pub config: Option<String>,

    /// Directory holding stack state files
    #[arg(
        long,
        global = true,
        env = "REGISTRY_MIRROR_STATE_DIR",
        default_value = ".registry-mirror"
    )]
    pub state_dir: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision registries and mirror images into them
    Up {
        /// Image tag to mirror (overrides image_tag in the config file)
        #[arg(long, env = "IMAGE_TAG")]
        image_tag: Option<String>,

        /// AWS region passed to the registry provider
        #[arg(long)]
        region: Option<String>,

        /// AWS CLI profile passed to the registry provider
        #[arg(long)]
        profile: Option<String>,
    },

    /// Show the resources and dependency edges `up` would apply
    Preview {
        /// Image tag to mirror (overrides image_tag in the config file)
        #[arg(long, env = "IMAGE_TAG")]
        image_tag: Option<String>,
    },

    /// Print registry URLs and pushed image names recorded for the stack
    Outputs {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every registry recorded for the stack
    Destroy {
        /// Confirm deletion (registries are force-deleted with their images)
        #[arg(long)]
        yes: bool,

        /// AWS region passed to the registry provider
        #[arg(long)]
        region: Option<String>,

        /// AWS CLI profile passed to the registry provider
        #[arg(long)]
        profile: Option<String>,
    },
}
