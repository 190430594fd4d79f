//! Ansible playbook that installs and tunes PostgreSQL on every inventory host.

use super::escape::yaml_quote;
use crate::domain::{ConfigurationDescriptor, ProvisionError, ProvisioningParameters};

/// Render the configuration playbook.
///
/// The `{{ version }}` / `{{ max_connections }}` placeholders are Jinja
/// expressions evaluated by Ansible, not by this renderer.
pub fn render_configuration(
    params: &ProvisioningParameters,
) -> Result<ConfigurationDescriptor, ProvisionError> {
    params.validate()?;

    let version = yaml_quote(&params.postgresql_version);
    let max_connections = params.max_connections;

    let text = format!(
        r#"---
- name: Install PostgreSQL
  hosts: all
  become: yes
  vars:
    version: {version}
    max_connections: {max_connections}
  tasks:
    - name: Remove the old PostgreSQL repository list file
      file:
        path: /etc/apt/sources.list.d/pgdg.list
        state: absent

    - name: Update apt repositories
      apt:
        update_cache: yes

    - name: Install required packages (wget and ca-certificates)
      apt:
        name:
          - wget
          - ca-certificates
        state: present

    - name: Add the PostgreSQL GPG key
      apt_key:
        url: https://www.postgresql.org/media/keys/ACCC4CF8.asc
        state: present

    - name: Add the PostgreSQL APT repository to sources list
      shell: echo "deb http://apt.postgresql.org/pub/repos/apt/ $(lsb_release -cs)-pgdg main" | tee -a /etc/apt/sources.list.d/pgdg.list
      args:
        creates: /etc/apt/sources.list.d/pgdg.list

    - name: Update apt repositories after adding PostgreSQL repo
      apt:
        update_cache: yes

    - name: Install PostgreSQL and its contrib package
      apt:
        name:
          - postgresql-{{{{ version }}}}
          - postgresql-contrib-{{{{ version }}}}
        state: present

    - name: Ensure postgresql.conf is configured with max_connections
      lineinfile:
        path: "/etc/postgresql/{{{{ version }}}}/main/postgresql.conf"
        regexp: '^#?max_connections ='
        line: "max_connections = {{{{ max_connections }}}}"

    - name: Restart PostgreSQL service
      service:
        name: postgresql
        state: restarted
"#
    );

    Ok(ConfigurationDescriptor::new(text))
}
