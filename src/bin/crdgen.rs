// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Writes the CRDs of every kind the controller reads or writes to deploy/crds/.
//! The controller does not own these APIs; the files exist to stand up a test
//! hub (kind, k3d) without installing the full multicluster stack.
//!
//! Usage:
//!   cargo run --bin crdgen

use kube::CustomResourceExt;
use managedcluster_import::crd::{ClusterDeployment, Klusterlet, ManagedCluster, ManifestWork, SyncSet};
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<ManagedCluster>("managedclusters.crd.yaml", output_dir)?;
    generate_crd::<ManifestWork>("manifestworks.crd.yaml", output_dir)?;
    generate_crd::<ClusterDeployment>("clusterdeployments.crd.yaml", output_dir)?;
    generate_crd::<SyncSet>("syncsets.crd.yaml", output_dir)?;
    generate_crd::<Klusterlet>("klusterlets.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let yaml = serde_yaml::to_string(&T::crd())?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}
