//! Golden-image recovery reboot, shared by the supervisor's comm monitor
//! and the standalone comm watchdog. Mirrors `utils.reboot_golden_code`:
//! stage the golden image into the install partition, then reboot.

use aal_common::config::Paths;
use aal_hwmgr::subprocess;

pub fn reboot_to_golden_image(paths: &Paths) -> std::io::Result<()> {
    let image = paths.golden_code_dir.join("image.tar.gz");
    let md5 = paths.golden_code_dir.join("image.tar.gz.md5");
    subprocess::exec(&format!("cp {} {}", image.display(), paths.install_dir.display()))?;
    subprocess::exec(&format!("cp {} {}", md5.display(), paths.install_dir.display()))?;
    subprocess::exec("/sbin/reboot")?;
    Ok(())
}
