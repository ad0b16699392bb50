//! Renders a [`StackSpec`] into a CloudFormation-shaped JSON template.
//!
//! Per-instance maintenance windows are attached the way a composition
//! library overrides generated properties: as a property override on the
//! already-built instance resource.

use crate::maintenance::scheduler::WindowAssignment;
use crate::stack::model::{DbInstanceSpec, InstanceRole, StackSpec};
use anyhow::{anyhow, bail, Result};
use serde_json::{json, Map, Value};

pub const MAINTENANCE_WINDOW_PROPERTY: &str = "PreferredMaintenanceWindow";

/// PascalCase logical id from construct path segments
pub fn logical_id(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

#[derive(Debug, Clone)]
pub struct CfnResource {
    pub logical_id: String,
    pub resource_type: String,
    properties: Map<String, Value>,
    overrides: Vec<(String, Value)>,
    depends_on: Vec<String>,
}

impl CfnResource {
    pub fn new(logical_id: impl Into<String>, resource_type: &str, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.to_string(),
            properties,
            overrides: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// Sets `path` (dot separated, relative to `Properties`) when rendering,
    /// replacing whatever the resource declared there
    pub fn add_property_override(&mut self, path: &str, value: Value) {
        self.overrides.push((path.to_string(), value));
    }

    pub fn add_dependency(&mut self, logical_id: &str) {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
        }
    }

    /// Properties with overrides applied in insertion order
    pub fn properties(&self) -> Map<String, Value> {
        let mut properties = self.properties.clone();
        for (path, value) in &self.overrides {
            apply_override(&mut properties, path, value.clone());
        }
        properties
    }

    pub fn to_json(&self) -> Value {
        let mut resource = json!({
            "Type": self.resource_type,
            "Properties": Value::Object(self.properties()),
        });
        if !self.depends_on.is_empty() {
            resource["DependsOn"] = json!(self.depends_on);
        }
        resource
    }
}

fn apply_override(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                apply_override(map, rest, value);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Template {
    pub description: String,
    resources: Vec<CfnResource>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            resources: Vec::new(),
        }
    }

    /// Adds `resource`, refusing a logical id that is already taken
    pub fn add(&mut self, resource: CfnResource) -> Result<&mut CfnResource> {
        if let Some(existing) = self.resource(&resource.logical_id) {
            bail!(
                "Logical id '{}' is used by both {} and {}",
                resource.logical_id,
                existing.resource_type,
                resource.resource_type
            );
        }
        self.resources.push(resource);
        let last = self.resources.len() - 1;
        Ok(&mut self.resources[last])
    }

    pub fn resource(&self, logical_id: &str) -> Option<&CfnResource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Option<&mut CfnResource> {
        self.resources.iter_mut().find(|r| r.logical_id == logical_id)
    }

    pub fn resources(&self) -> &[CfnResource] {
        &self.resources
    }

    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a CfnResource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    pub fn to_json(&self) -> Value {
        let resources: Map<String, Value> = self
            .resources
            .iter()
            .map(|r| (r.logical_id.clone(), r.to_json()))
            .collect();
        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": self.description,
            "Resources": resources,
        })
    }
}

/// Logical id of the DB instance resource for `instance`
pub fn instance_logical_id(stack: &StackSpec, instance: &DbInstanceSpec) -> String {
    logical_id(&[stack.aurora.name.as_str(), instance.name.as_str()])
}

/// Builds the full stack and attaches each assignment as a
/// `PreferredMaintenanceWindow` override on its instance
pub fn render_template(stack: &StackSpec, assignments: &[WindowAssignment]) -> Result<Template> {
    let mut template = Template::new(format!("{} (generated by auroraplan)", stack.name));

    let subnet_ids = add_network(&mut template, stack)?;
    let ec2_sg = add_ec2_instance(&mut template, stack, &subnet_ids)?;
    add_aurora(&mut template, stack, &subnet_ids, &ec2_sg)?;

    for assignment in assignments {
        let instance = stack
            .aurora
            .instances()
            .into_iter()
            .find(|i| i.identifier == assignment.target_id)
            .ok_or_else(|| anyhow!("No DB instance with identifier '{}'", assignment.target_id))?;
        let id = instance_logical_id(stack, instance);
        let resource = template
            .resource_mut(&id)
            .ok_or_else(|| anyhow!("DB instance resource '{}' was not rendered", id))?;
        resource.add_property_override(
            MAINTENANCE_WINDOW_PROPERTY,
            Value::String(assignment.window.to_string()),
        );
    }

    Ok(template)
}

fn add_network(template: &mut Template, stack: &StackSpec) -> Result<Vec<String>> {
    let vpc = &stack.vpc;
    let vpc_id = logical_id(&[vpc.name.as_str()]);

    template.add(CfnResource::new(
        &vpc_id,
        "AWS::EC2::VPC",
        json!({
            "CidrBlock": vpc.cidr,
            "EnableDnsHostnames": true,
            "EnableDnsSupport": true,
            "Tags": [{ "Key": "Name", "Value": format!("{}/{}", stack.name, vpc.name) }],
        }),
    ))?;

    let mut subnet_ids = Vec::with_capacity(vpc.max_azs as usize);
    for az in 0..vpc.max_azs {
        let subnet_id = logical_id(&[vpc.name.as_str(), "Isolated", format!("Subnet{}", az + 1).as_str()]);
        template.add(CfnResource::new(
            &subnet_id,
            "AWS::EC2::Subnet",
            json!({
                "VpcId": reference(&vpc_id),
                "AvailabilityZone": { "Fn::Select": [az, { "Fn::GetAZs": "" }] },
                "CidrBlock": { "Fn::Select": [az, { "Fn::Cidr": [vpc.cidr, vpc.max_azs, "8"] }] },
                "MapPublicIpOnLaunch": false,
            }),
        ))?;
        subnet_ids.push(subnet_id);
    }

    Ok(subnet_ids)
}

fn add_ec2_instance(template: &mut Template, stack: &StackSpec, subnet_ids: &[String]) -> Result<String> {
    let ec2 = &stack.ec2_instance;
    let sg_id = logical_id(&[ec2.name.as_str(), "SecurityGroup"]);

    template.add(CfnResource::new(
        &sg_id,
        "AWS::EC2::SecurityGroup",
        json!({
            "GroupDescription": format!("{}/{}", stack.name, ec2.name),
            "VpcId": reference(&logical_id(&[stack.vpc.name.as_str()])),
            "SecurityGroupEgress": [{ "CidrIp": "0.0.0.0/0", "IpProtocol": "-1" }],
        }),
    ))?;

    let mut properties = json!({
        "ImageId": ec2.image_id,
        "InstanceType": ec2.instance_type,
        "SecurityGroupIds": [get_att(&sg_id, "GroupId")],
    });
    if let Some(first) = subnet_ids.first() {
        properties["SubnetId"] = reference(first);
    }
    template.add(CfnResource::new(logical_id(&[ec2.name.as_str()]), "AWS::EC2::Instance", properties))?;

    Ok(sg_id)
}

fn add_aurora(
    template: &mut Template,
    stack: &StackSpec,
    subnet_ids: &[String],
    ec2_sg: &str,
) -> Result<()> {
    let aurora = &stack.aurora;
    let id = |suffix: &str| logical_id(&[aurora.name.as_str(), suffix]);

    let cluster_pg = id("DbClusterParameterGroup");
    template.add(CfnResource::new(
        &cluster_pg,
        "AWS::RDS::DBClusterParameterGroup",
        json!({
            "Description": aurora.cluster_parameter_group.description,
            "Family": aurora.cluster_parameter_group.family,
            "Parameters": aurora.cluster_parameter_group.parameters,
        }),
    ))?;

    let instance_pg = id("DbParameterGroup");
    template.add(CfnResource::new(
        &instance_pg,
        "AWS::RDS::DBParameterGroup",
        json!({
            "Description": aurora.instance_parameter_group.description,
            "Family": aurora.instance_parameter_group.family,
            "Parameters": aurora.instance_parameter_group.parameters,
        }),
    ))?;

    let subnet_group = id("SubnetGroup");
    template.add(CfnResource::new(
        &subnet_group,
        "AWS::RDS::DBSubnetGroup",
        json!({
            "DBSubnetGroupDescription": "description",
            "DBSubnetGroupName": "subnetgroup",
            "SubnetIds": subnet_ids.iter().map(|s| reference(s)).collect::<Vec<_>>(),
        }),
    ))?;

    let monitoring_role = id("MonitoringRole");
    template.add(CfnResource::new(
        &monitoring_role,
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": { "Service": "monitoring.rds.amazonaws.com" },
                }],
            },
            "ManagedPolicyArns": [{
                "Fn::Join": ["", [
                    "arn:",
                    { "Ref": "AWS::Partition" },
                    ":iam::aws:policy/service-role/AmazonRDSEnhancedMonitoringRole",
                ]],
            }],
        }),
    ))?;

    let cluster_sg = id("SecurityGroup");
    template.add(CfnResource::new(
        &cluster_sg,
        "AWS::EC2::SecurityGroup",
        json!({
            "GroupDescription": "RDS security group",
            "VpcId": reference(&logical_id(&[stack.vpc.name.as_str()])),
            "SecurityGroupEgress": [{ "CidrIp": "0.0.0.0/0", "IpProtocol": "-1" }],
        }),
    ))?;
    template.add(CfnResource::new(
        logical_id(&[aurora.name.as_str(), "SecurityGroup", "From", ec2_sg, aurora.port.to_string().as_str()]),
        "AWS::EC2::SecurityGroupIngress",
        json!({
            "GroupId": get_att(&cluster_sg, "GroupId"),
            "SourceSecurityGroupId": get_att(ec2_sg, "GroupId"),
            "IpProtocol": "tcp",
            "FromPort": aurora.port,
            "ToPort": aurora.port,
            "Description": format!("from {}:{}", ec2_sg, aurora.port),
        }),
    ))?;

    let cluster = id("Default");
    let mut cluster_properties = json!({
        "Engine": "aurora-postgresql",
        "EngineVersion": aurora.engine_version,
        "DBClusterIdentifier": aurora.cluster_identifier,
        "DatabaseName": aurora.default_database_name,
        "Port": aurora.port,
        "DBClusterParameterGroupName": reference(&cluster_pg),
        "DBSubnetGroupName": reference(&subnet_group),
        "VpcSecurityGroupIds": [get_att(&cluster_sg, "GroupId")],
        "BackupRetentionPeriod": aurora.backup.retention_days,
        "PreferredBackupWindow": aurora.backup.preferred_window.to_string(),
        "PreferredMaintenanceWindow": aurora.preferred_maintenance_window.to_string(),
        "EnableCloudwatchLogsExports": aurora.cloudwatch_logs_exports,
        "StorageEncrypted": aurora.storage_encrypted,
        "DeletionProtection": aurora.deletion_protection,
        "EnableIAMDatabaseAuthentication": aurora.iam_authentication,
        "CopyTagsToSnapshot": aurora.copy_tags_to_snapshot,
        "MasterUsername": "postgres",
        "ManageMasterUserPassword": true,
    });
    if aurora.storage_encrypted {
        cluster_properties["KmsKeyId"] = json!(aurora.kms_key_alias);
    }
    template.add(CfnResource::new(&cluster, "AWS::RDS::DBCluster", cluster_properties))?;

    for export in &aurora.cloudwatch_logs_exports {
        let log_group = template.add(CfnResource::new(
            logical_id(&[aurora.name.as_str(), "LogRetention", export.as_str()]),
            "AWS::Logs::LogGroup",
            json!({
                "LogGroupName": format!("/aws/rds/cluster/{}/{}", aurora.cluster_identifier, export),
                "RetentionInDays": aurora.log_retention_days,
            }),
        ))?;
        log_group.add_dependency(&cluster);
    }

    for (tier, instance) in aurora.instances().into_iter().enumerate() {
        let promotion_tier = match instance.role {
            InstanceRole::Writer => 0,
            InstanceRole::Reader => tier.min(15),
        };
        let db_instance = template.add(CfnResource::new(
            instance_logical_id(stack, instance),
            "AWS::RDS::DBInstance",
            json!({
                "DBInstanceIdentifier": instance.identifier,
                "DBClusterIdentifier": reference(&cluster),
                "Engine": "aurora-postgresql",
                "DBInstanceClass": instance.instance_class,
                "DBParameterGroupName": reference(&instance_pg),
                "PubliclyAccessible": instance.publicly_accessible,
                "AutoMinorVersionUpgrade": instance.auto_minor_version_upgrade,
                "AllowMajorVersionUpgrade": instance.allow_major_version_upgrade,
                "EnablePerformanceInsights": instance.enable_performance_insights,
                "CACertificateIdentifier": instance.ca_certificate,
                "MonitoringInterval": aurora.monitoring_interval_secs,
                "MonitoringRoleArn": get_att(&monitoring_role, "Arn"),
                "PromotionTier": promotion_tier,
            }),
        ))?;
        if instance.enable_performance_insights {
            db_instance.add_property_override("PerformanceInsightsRetentionPeriod", json!(7));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintenance::scheduler::{assign_windows, AssignmentOrder, ShiftSpec};
    use crate::stack::model::DbInstanceSpec;

    fn stack_with_readers(readers: usize) -> StackSpec {
        let mut stack = StackSpec::default();
        for n in 1..=readers {
            stack.aurora.readers.push(DbInstanceSpec::provisioned(
                &format!("Reader{}", n),
                &format!("db-instance-reader-{}", n),
                InstanceRole::Reader,
            ));
        }
        stack
    }

    #[test]
    fn test_logical_id() {
        assert_eq!(logical_id(&["Aurora", "Writer"]), "AuroraWriter");
        assert_eq!(logical_id(&["db-instance-writer"]), "DbInstanceWriter");
        assert_eq!(logical_id(&["Vpc", "Isolated", "Subnet1"]), "VpcIsolatedSubnet1");
    }

    #[test]
    fn test_property_override_nested_path() {
        let mut resource = CfnResource::new("Thing", "AWS::Test::Thing", json!({ "A": 1, "B": { "C": 2 } }));
        resource.add_property_override("B.D", json!(3));
        resource.add_property_override("A", json!("replaced"));
        resource.add_property_override("E.F.G", json!(true));

        let properties = resource.properties();
        assert_eq!(properties["A"], json!("replaced"));
        assert_eq!(properties["B"], json!({ "C": 2, "D": 3 }));
        assert_eq!(properties["E"]["F"]["G"], json!(true));
    }

    #[test]
    fn test_render_default_stack() {
        let stack = StackSpec::default();
        let template = render_template(&stack, &[]).unwrap();
        let json = template.to_json();

        let cluster = &json["Resources"]["AuroraDefault"];
        assert_eq!(cluster["Type"], "AWS::RDS::DBCluster");
        assert_eq!(cluster["Properties"]["PreferredMaintenanceWindow"], "Sat:17:00-Sat:17:30");
        assert_eq!(cluster["Properties"]["PreferredBackupWindow"], "16:00-16:30");
        assert_eq!(cluster["Properties"]["KmsKeyId"], "alias/aws/rds");

        let writer = &json["Resources"]["AuroraWriter"];
        assert_eq!(writer["Properties"]["DBInstanceIdentifier"], "db-instance-writer");
        assert!(writer["Properties"].get(MAINTENANCE_WINDOW_PROPERTY).is_none());

        assert_eq!(template.resources_of_type("AWS::EC2::Subnet").count(), 2);
        let ingress = template
            .resources_of_type("AWS::EC2::SecurityGroupIngress")
            .next()
            .unwrap();
        assert_eq!(ingress.properties()["FromPort"], json!(5432));
    }

    #[test]
    fn test_render_attaches_reversed_windows() {
        let stack = stack_with_readers(2);
        let instances = stack.aurora.instances();
        let schedule = ShiftSpec::new(stack.aurora.preferred_maintenance_window, 30, instances.len() as i64)
            .unwrap()
            .generate();
        let assignments = assign_windows(&instances, &schedule, AssignmentOrder::Reversed).unwrap();

        let json = render_template(&stack, &assignments).unwrap().to_json();
        let window = |id: &str| json["Resources"][id]["Properties"][MAINTENANCE_WINDOW_PROPERTY].clone();
        assert_eq!(window("AuroraWriter"), "Sat:18:30-Sat:19:00");
        assert_eq!(window("AuroraReader1"), "Sat:18:00-Sat:18:30");
        assert_eq!(window("AuroraReader2"), "Sat:17:30-Sat:18:00");
    }

    #[test]
    fn test_render_unknown_assignment_fails() {
        let stack = StackSpec::default();
        let assignments = vec![WindowAssignment {
            target_id: "missing".to_string(),
            window: "Sat:17:30-Sat:18:00".parse().unwrap(),
        }];
        assert!(render_template(&stack, &assignments).is_err());
    }

    #[test]
    fn test_log_group_depends_on_cluster() {
        let template = render_template(&StackSpec::default(), &[]).unwrap();
        let json = template.to_json();
        let log_group = &json["Resources"]["AuroraLogRetentionPostgresql"];
        assert_eq!(log_group["DependsOn"], json!(["AuroraDefault"]));
        assert_eq!(log_group["Properties"]["RetentionInDays"], 365);
    }

    #[test]
    fn test_add_rejects_duplicate_logical_id() {
        let mut template = Template::new("test");
        template
            .add(CfnResource::new("Thing", "AWS::Test::Thing", json!({})))
            .unwrap();
        let err = template
            .add(CfnResource::new("Thing", "AWS::Test::Other", json!({})))
            .unwrap_err();
        assert!(err.to_string().contains("Logical id 'Thing'"));
        assert_eq!(template.resources().len(), 1);
    }

    #[test]
    fn test_render_rejects_colliding_instance_names() {
        let mut stack = StackSpec::default();
        for n in 1..=2 {
            stack.aurora.readers.push(DbInstanceSpec::provisioned(
                "Reader",
                &format!("db-instance-reader-{}", n),
                InstanceRole::Reader,
            ));
        }
        let err = render_template(&stack, &[]).unwrap_err();
        assert!(err.to_string().contains("AuroraReader"));

        let mut stack = StackSpec::default();
        stack.aurora.readers.push(DbInstanceSpec::provisioned(
            "Default",
            "db-instance-reader-1",
            InstanceRole::Reader,
        ));
        let err = render_template(&stack, &[]).unwrap_err();
        assert!(err.to_string().contains("AuroraDefault"));
    }
}
