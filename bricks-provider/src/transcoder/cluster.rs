//! Cluster schema <-> `ClusterSpec`.

use bricks_api::{
    AutoScale, AwsAttributes, ClusterLogConf, ClusterSpec, DbfsStorageInfo, EbsVolumeType,
    S3StorageInfo,
};

use super::{Fields, Result, put_block, put_bool, put_int, put_map, put_string, put_strings};
use crate::error::ValidationError;
use crate::tree::{ConfigSource, ConfigTree};

const SIZE_GROUP: &[&str] = &["num_workers", "autoscale"];
const LOG_DESTINATIONS: &[&str] = &["dbfs", "s3"];

/// Build a cluster request from the tree. Fails before anything is sent if
/// both a fixed size and an autoscale range are declared.
pub fn expand_cluster(src: &dyn ConfigSource) -> Result<ClusterSpec> {
    expand_fields(&Fields::root(src))
}

pub(crate) fn expand_fields(f: &Fields<'_>) -> Result<ClusterSpec> {
    f.exclusive("size", SIZE_GROUP)?;

    let autoscale = match f.block("autoscale")? {
        Some(block) => {
            let a = f.nested("autoscale", &block);
            Some(AutoScale {
                min_workers: a.required_int32("min_workers")?,
                max_workers: a.required_int32("max_workers")?,
            })
        }
        None => None,
    };

    let aws_attributes = match f.block("aws_attributes")? {
        Some(block) => Some(expand_aws_attributes(&f.nested("aws_attributes", &block))?),
        None => None,
    };

    let cluster_log_conf = match f.block("cluster_log_conf")? {
        Some(block) => Some(expand_log_conf(&f.nested("cluster_log_conf", &block))?),
        None => None,
    };

    Ok(ClusterSpec {
        num_workers: f.int32("num_workers")?,
        autoscale,
        cluster_name: f.string("cluster_name")?,
        spark_version: f.required_string("spark_version")?,
        spark_conf: f.string_map("spark_conf")?,
        aws_attributes,
        node_type_id: f.required_string("node_type_id")?,
        driver_node_type_id: f.string("driver_node_type_id")?,
        ssh_public_keys: f.strings("ssh_public_keys")?,
        custom_tags: f.string_map("custom_tags")?,
        cluster_log_conf,
        spark_env_vars: f.string_map("spark_env_vars")?,
        autotermination_minutes: f.int32("autotermination_minutes")?,
        enable_elastic_disk: f.bool("enable_elastic_disk")?,
    })
}

fn expand_aws_attributes(f: &Fields<'_>) -> Result<AwsAttributes> {
    let ebs_volume_type = match f.string("ebs_volume_type")? {
        Some(raw) => Some(raw.parse::<EbsVolumeType>().map_err(|reason| {
            ValidationError::InvalidValue {
                path: f.path_of("ebs_volume_type"),
                reason,
            }
        })?),
        None => None,
    };

    Ok(AwsAttributes {
        zone_id: f.string("zone_id")?,
        instance_profile_arn: f.string("instance_profile_arn")?,
        ebs_volume_type,
        ebs_volume_count: f.int32("ebs_volume_count")?,
        ebs_volume_size: f.int32("ebs_volume_size")?,
    })
}

fn expand_log_conf(f: &Fields<'_>) -> Result<ClusterLogConf> {
    let kind = f.one_of("destination", LOG_DESTINATIONS)?;
    // one_of guarantees the block is populated
    let block = f.block(kind)?.unwrap_or_default();
    let d = f.nested(kind, &block);
    let destination = d.required_string("destination")?;

    Ok(match kind {
        "dbfs" => ClusterLogConf::Dbfs(DbfsStorageInfo { destination }),
        _ => ClusterLogConf::S3(S3StorageInfo {
            destination,
            region: d.string("region")?,
            endpoint: d.string("endpoint")?,
        }),
    })
}

/// Flatten a cluster spec into a fresh tree.
pub fn flatten_cluster(spec: &ClusterSpec) -> ConfigTree {
    let mut tree = ConfigTree::new();
    flatten_cluster_into(spec, &mut tree);
    tree
}

/// Write every cluster schema field into `dst`.
pub fn flatten_cluster_into(spec: &ClusterSpec, dst: &mut dyn ConfigSource) {
    // The remote reports the live worker count for autoscaling clusters;
    // carrying it over would make the tree violate the size group.
    let num_workers = if spec.autoscale.is_some() {
        None
    } else {
        spec.num_workers
    };
    put_int(dst, "num_workers", num_workers);

    let autoscale = spec.autoscale.map(|a| {
        ConfigTree::new()
            .with("min_workers", a.min_workers)
            .with("max_workers", a.max_workers)
    });
    put_block(dst, "autoscale", autoscale);

    put_string(dst, "cluster_name", spec.cluster_name.as_ref());
    put_string(dst, "spark_version", Some(&spec.spark_version));
    put_map(dst, "spark_conf", spec.spark_conf.as_ref());
    put_block(
        dst,
        "aws_attributes",
        spec.aws_attributes.as_ref().map(flatten_aws_attributes),
    );
    put_string(dst, "node_type_id", Some(&spec.node_type_id));
    put_string(dst, "driver_node_type_id", spec.driver_node_type_id.as_ref());
    put_strings(dst, "ssh_public_keys", spec.ssh_public_keys.as_ref());
    put_map(dst, "custom_tags", spec.custom_tags.as_ref());
    put_block(
        dst,
        "cluster_log_conf",
        spec.cluster_log_conf.as_ref().map(flatten_log_conf),
    );
    put_map(dst, "spark_env_vars", spec.spark_env_vars.as_ref());
    put_int(dst, "autotermination_minutes", spec.autotermination_minutes);
    put_bool(dst, "enable_elastic_disk", spec.enable_elastic_disk);
}

fn flatten_aws_attributes(attrs: &AwsAttributes) -> ConfigTree {
    let mut tree = ConfigTree::new();
    put_string(&mut tree, "zone_id", attrs.zone_id.as_ref());
    put_string(&mut tree, "instance_profile_arn", attrs.instance_profile_arn.as_ref());
    let volume_type = attrs.ebs_volume_type.map(|t| t.as_str().to_string());
    put_string(&mut tree, "ebs_volume_type", volume_type.as_ref());
    put_int(&mut tree, "ebs_volume_count", attrs.ebs_volume_count);
    put_int(&mut tree, "ebs_volume_size", attrs.ebs_volume_size);
    tree
}

fn flatten_log_conf(conf: &ClusterLogConf) -> ConfigTree {
    let mut tree = ConfigTree::new();
    let (dbfs, s3) = match conf {
        ClusterLogConf::Dbfs(d) => (
            Some(ConfigTree::new().with("destination", d.destination.as_str())),
            None,
        ),
        ClusterLogConf::S3(s) => {
            let mut block = ConfigTree::new().with("destination", s.destination.as_str());
            put_string(&mut block, "region", s.region.as_ref());
            put_string(&mut block, "endpoint", s.endpoint.as_ref());
            (None, Some(block))
        }
    };
    put_block(&mut tree, "dbfs", dbfs);
    put_block(&mut tree, "s3", s3);
    tree
}
