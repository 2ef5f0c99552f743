//! Test fixtures and sample data
//!
//! Provides pre-built configuration documents for testing.

/// Two stores, two archives and three targets
pub fn sample_config_yaml() -> &'static str {
    r#"
stores:
  filesystem:
    usb: /mnt/usb
  ssh:
    nas:
      hostname: nas.local
      username: bob
      port: 2222
      path: /srv/borg
      ssh_key: ~/.ssh/id_backup
archives:
  photos:
    include:
      - ~/Pictures
    exclude:
      - ~/Pictures/cache
      - "*.tmp"
  docs:
    include:
      - ~/Documents
targets:
  - archive: photos
    store: usb
    compression: zstd,3
    one_file_system: true
  - archive: photos
    store: nas
    encryption: repokey
    prune:
      keep_daily: 7
      keep_monthly: 6
  - archive: docs
    store: usb
"#
}

/// `usb` declared both as a filesystem and an SSH store
pub fn duplicate_store_yaml() -> &'static str {
    r#"
stores:
  filesystem:
    usb: /mnt/usb
  ssh:
    usb:
      hostname: usb.local
archives:
  docs: {}
targets:
  - { archive: docs, store: usb }
"#
}

/// Target referring to an archive that is never declared
pub fn unknown_archive_yaml() -> &'static str {
    r#"
stores:
  filesystem:
    usb: /mnt/usb
archives:
  docs: {}
targets:
  - { archive: music, store: usb }
"#
}

/// Same target declared twice
pub fn duplicate_target_yaml() -> &'static str {
    r#"
stores:
  filesystem:
    usb: /mnt/usb
archives:
  docs: {}
targets:
  - { archive: docs, store: usb }
  - { archive: docs, store: usb, compression: zstd }
"#
}
