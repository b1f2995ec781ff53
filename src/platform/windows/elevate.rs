use crate::model::error::Error;
use crate::model::error::schedule::ScheduleError;
use std::ffi::OsStr;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use windows::Win32::Foundation::{CloseHandle, ERROR_CANCELLED, GetLastError, WAIT_OBJECT_0};
use windows::Win32::System::Com::{
    CoInitializeEx, COINIT_APARTMENTTHREADED, COINIT_DISABLE_OLE1DDE,
};
use windows::Win32::System::Threading::{GetExitCodeProcess, INFINITE, WaitForSingleObject};
use windows::Win32::UI::Shell::{ShellExecuteExW, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW};
use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;
use windows::core::PCWSTR;

/// Runs a command through the shell "runas" verb and waits for it to exit.
/// The user answers a UAC prompt; declining it is reported as a distinct
/// error so the caller can tell refusal apart from command failure.
pub fn run_elevated(program: &str, args: &[String]) -> Result<(), Error> {
    let file = wide(program);
    let params = wide(&join_params(args));

    let task = elevated_task(args);
    let declined = || ScheduleError::ElevationDeclined { task: task.clone() };
    let failed = |detail: &str| ScheduleError::TaskCommandFailed {
        detail: detail.to_string(),
    };

    unsafe {
        let mut sei: SHELLEXECUTEINFOW = mem::zeroed();
        let verb = "runas\0".encode_utf16().collect::<Vec<u16>>();

        if CoInitializeEx(None, COINIT_APARTMENTTHREADED | COINIT_DISABLE_OLE1DDE).is_err() {
            Err(failed("COM initialization failed"))?
        }

        sei.fMask = SEE_MASK_NOCLOSEPROCESS;
        sei.cbSize = size_of::<SHELLEXECUTEINFOW>() as u32;
        sei.lpVerb = PCWSTR(verb.as_ptr());
        sei.lpFile = PCWSTR(file.as_ptr());
        sei.lpParameters = PCWSTR(params.as_ptr());
        sei.nShow = SW_HIDE.0;

        if ShellExecuteExW(&mut sei).is_err() {
            if GetLastError() == ERROR_CANCELLED {
                Err(declined())?
            }
            Err(failed("elevated launch failed"))?
        }
        if sei.hProcess.is_invalid() {
            Err(failed("elevated launch returned no process"))?
        }

        let waited = WaitForSingleObject(sei.hProcess, INFINITE);
        let mut exit_code = 0u32;
        let exit = GetExitCodeProcess(sei.hProcess, &mut exit_code);
        CloseHandle(sei.hProcess).map_err(|_| failed("process handle release failed"))?;

        if waited != WAIT_OBJECT_0 || exit.is_err() {
            Err(failed("elevated process did not report an exit status"))?
        }
        if exit_code != 0 {
            Err(failed(&format!(
                "elevated command exited with status {exit_code}"
            )))?
        }
        Ok(())
    }
}

fn wide(text: &str) -> Vec<u16> {
    OsStr::new(text).encode_wide().chain(Some(0)).collect()
}

/// Arguments containing whitespace are quoted before joining. Embedded
/// quotes already carry their own escaping from the caller.
fn join_params(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.contains(' ') && !arg.starts_with('"') {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Task name named by a `/tn` flag, for the refusal error.
fn elevated_task(args: &[String]) -> String {
    args.iter()
        .position(|arg| arg.eq_ignore_ascii_case("/tn"))
        .and_then(|index| args.get(index + 1))
        .cloned()
        .unwrap_or_else(|| "scheduled task".to_string())
}
