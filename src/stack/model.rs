use crate::maintenance::scheduler::{AssignmentOrder, MaintenanceTarget};
use crate::maintenance::day::DayOfWeek;
use crate::maintenance::window::{DailyWindow, DayTime, MaintenanceWindow};
use crate::stack::template::logical_id;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSpec {
    pub name: String,
    pub vpc: VpcSpec,
    pub ec2_instance: Ec2InstanceSpec,
    pub aurora: AuroraClusterSpec,
    pub instance_maintenance: InstanceMaintenanceSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VpcSpec {
    pub name: String,
    pub cidr: String,
    pub max_azs: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ec2InstanceSpec {
    pub name: String,
    pub instance_type: String,
    pub image_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGroupSpec {
    pub description: String,
    pub family: String,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceRole {
    Writer,
    Reader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbInstanceSpec {
    /// Construct name, used to derive the logical id
    pub name: String,
    pub identifier: String,
    pub role: InstanceRole,
    #[serde(default = "default_instance_class")]
    pub instance_class: String,
    #[serde(default)]
    pub publicly_accessible: bool,
    #[serde(default = "default_true")]
    pub auto_minor_version_upgrade: bool,
    #[serde(default)]
    pub allow_major_version_upgrade: bool,
    #[serde(default = "default_true")]
    pub enable_performance_insights: bool,
    #[serde(default = "default_ca_certificate")]
    pub ca_certificate: String,
}

impl MaintenanceTarget for DbInstanceSpec {
    fn target_id(&self) -> &str {
        &self.identifier
    }
}

impl DbInstanceSpec {
    pub fn provisioned(name: &str, identifier: &str, role: InstanceRole) -> Self {
        Self {
            name: name.to_string(),
            identifier: identifier.to_string(),
            role,
            instance_class: default_instance_class(),
            publicly_accessible: false,
            auto_minor_version_upgrade: true,
            allow_major_version_upgrade: false,
            enable_performance_insights: true,
            ca_certificate: default_ca_certificate(),
        }
    }
}

fn default_instance_class() -> String {
    "db.t3.medium".to_string()
}

fn default_ca_certificate() -> String {
    "rds-ca-rsa4096-g1".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSpec {
    pub retention_days: u16,
    pub preferred_window: DailyWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuroraClusterSpec {
    pub name: String,
    pub cluster_identifier: String,
    pub engine_version: String,
    pub default_database_name: String,
    pub port: u16,
    pub cluster_parameter_group: ParameterGroupSpec,
    pub instance_parameter_group: ParameterGroupSpec,
    pub writer: DbInstanceSpec,
    pub readers: Vec<DbInstanceSpec>,
    pub backup: BackupSpec,
    pub preferred_maintenance_window: MaintenanceWindow,
    pub cloudwatch_logs_exports: Vec<String>,
    pub log_retention_days: u32,
    pub storage_encrypted: bool,
    pub kms_key_alias: String,
    pub monitoring_interval_secs: u32,
    pub deletion_protection: bool,
    pub iam_authentication: bool,
    pub copy_tags_to_snapshot: bool,
}

impl AuroraClusterSpec {
    /// Writer first, then readers in declaration order
    pub fn instances(&self) -> Vec<&DbInstanceSpec> {
        std::iter::once(&self.writer).chain(self.readers.iter()).collect()
    }
}

/// How instance windows are derived from the cluster window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceMaintenanceSpec {
    pub step_minutes: u32,
    pub order: AssignmentOrder,
}

impl Default for InstanceMaintenanceSpec {
    fn default() -> Self {
        Self {
            step_minutes: 30,
            order: AssignmentOrder::Reversed,
        }
    }
}

impl Default for VpcSpec {
    fn default() -> Self {
        Self {
            name: "Vpc".to_string(),
            cidr: "10.10.0.0/20".to_string(),
            max_azs: 2,
        }
    }
}

impl Default for Ec2InstanceSpec {
    fn default() -> Self {
        Self {
            name: "Ec2InstanceA".to_string(),
            instance_type: "t3.micro".to_string(),
            image_id: "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/al2023-ami-kernel-default-x86_64}}"
                .to_string(),
        }
    }
}

impl Default for ParameterGroupSpec {
    fn default() -> Self {
        Self {
            description: "aurora-postgresql14".to_string(),
            family: "aurora-postgresql14".to_string(),
            parameters: BTreeMap::new(),
        }
    }
}

impl Default for AuroraClusterSpec {
    fn default() -> Self {
        let cluster_parameters = [
            ("rds.logical_replication", "1"),
            ("log_statement", "none"),
            ("pgaudit.log", "all"),
            ("pgaudit.role", "rds_pgaudit"),
            ("shared_preload_libraries", "pgaudit"),
            ("ssl_ciphers", "TLS_RSA_WITH_AES_256_GCM_SHA384"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "Aurora".to_string(),
            cluster_identifier: "db-cluster".to_string(),
            engine_version: "14.10".to_string(),
            default_database_name: "testDB".to_string(),
            port: 5432,
            cluster_parameter_group: ParameterGroupSpec {
                parameters: cluster_parameters,
                ..ParameterGroupSpec::default()
            },
            instance_parameter_group: ParameterGroupSpec::default(),
            writer: DbInstanceSpec::provisioned("Writer", "db-instance-writer", InstanceRole::Writer),
            readers: Vec::new(),
            backup: BackupSpec {
                retention_days: 7,
                preferred_window: DailyWindow {
                    start: (16, 0),
                    end: (16, 30),
                },
            },
            preferred_maintenance_window: MaintenanceWindow::new(
                DayTime {
                    day: DayOfWeek::Sat,
                    hour: 17,
                    minute: 0,
                },
                DayTime {
                    day: DayOfWeek::Sat,
                    hour: 17,
                    minute: 30,
                },
            ),
            cloudwatch_logs_exports: vec!["postgresql".to_string()],
            log_retention_days: 365,
            storage_encrypted: true,
            kms_key_alias: "alias/aws/rds".to_string(),
            monitoring_interval_secs: 60,
            deletion_protection: false,
            iam_authentication: false,
            copy_tags_to_snapshot: true,
        }
    }
}

impl Default for StackSpec {
    fn default() -> Self {
        Self {
            name: "AuroraStack".to_string(),
            vpc: VpcSpec::default(),
            ec2_instance: Ec2InstanceSpec::default(),
            aurora: AuroraClusterSpec::default(),
            instance_maintenance: InstanceMaintenanceSpec::default(),
        }
    }
}

/// Resource names rendered under the cluster next to its instances
const RESERVED_CLUSTER_NAMES: [&str; 6] = [
    "Default",
    "DbClusterParameterGroup",
    "DbParameterGroup",
    "SubnetGroup",
    "MonitoringRole",
    "SecurityGroup",
];

impl StackSpec {
    /// Checks the invariants the template relies on
    pub fn validate(&self) -> Result<()> {
        if self.vpc.max_azs == 0 {
            bail!("VPC '{}' needs at least one availability zone", self.vpc.name);
        }

        if self.aurora.writer.role != InstanceRole::Writer {
            bail!(
                "Instance '{}' is configured as the writer but has role reader",
                self.aurora.writer.identifier
            );
        }

        let mut seen = HashSet::new();
        let mut names = HashSet::new();
        for instance in self.aurora.instances() {
            if instance.identifier.is_empty() {
                bail!("Instance '{}' has an empty identifier", instance.name);
            }
            if !seen.insert(instance.identifier.as_str()) {
                bail!("Duplicate instance identifier '{}'", instance.identifier);
            }

            let name = logical_id(&[instance.name.as_str()]);
            if name.is_empty() {
                bail!("Instance '{}' needs a name with letters or digits", instance.identifier);
            }
            if RESERVED_CLUSTER_NAMES.iter().any(|r| name == *r)
                || name.starts_with("LogRetention")
                || name.starts_with("SecurityGroupFrom")
            {
                bail!(
                    "Instance name '{}' collides with a cluster resource name",
                    instance.name
                );
            }
            if !names.insert(name) {
                bail!(
                    "Instance name '{}' is used by more than one instance",
                    instance.name
                );
            }
        }

        for reader in &self.aurora.readers {
            if reader.role != InstanceRole::Reader {
                bail!("Instance '{}' is listed as a reader but has role writer", reader.identifier);
            }
        }

        if self.instance_maintenance.step_minutes == 0 && !self.aurora.readers.is_empty() {
            bail!("step_minutes must be greater than zero when the cluster has readers");
        }

        Ok(())
    }
}
