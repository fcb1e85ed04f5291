//! Script fragments for the generated deployment scripts.

use super::{ProjectKind, ScriptType};
use std::fmt::Write as _;

const BATCH_HEADER: &str = r#"@if "%SCM_TRACE_LEVEL%" NEQ "4" @echo off

:: ----------------------
:: KUDU Deployment Script
:: ----------------------

:: Setup
:: -----

setlocal enabledelayedexpansion

SET ARTIFACTS=%~dp0%..\artifacts

IF NOT DEFINED DEPLOYMENT_SOURCE (
  SET DEPLOYMENT_SOURCE=%~dp0%.
)

IF NOT DEFINED DEPLOYMENT_TARGET (
  SET DEPLOYMENT_TARGET=%ARTIFACTS%\wwwroot
)

IF NOT DEFINED NEXT_MANIFEST_PATH (
  SET NEXT_MANIFEST_PATH=%ARTIFACTS%\manifest

  IF NOT DEFINED PREVIOUS_MANIFEST_PATH (
    SET PREVIOUS_MANIFEST_PATH=%ARTIFACTS%\manifest
  )
)

IF NOT DEFINED KUDU_SYNC_CMD (
  :: Install kudu sync
  echo Installing Kudu Sync
  call npm install kudusync -g --silent
  IF !ERRORLEVEL! NEQ 0 goto error

  SET KUDU_SYNC_CMD=%appdata%\npm\kuduSync.cmd
)
"#;

const BATCH_FOOTER: &str = r#"
goto end

:ExecuteCmd
setlocal
set _CMD_=%*
call %_CMD_%
if "%ERRORLEVEL%" NEQ "0" echo Failed exitCode=%ERRORLEVEL%, command=%_CMD_%
exit /b %ERRORLEVEL%

:error
endlocal
echo An error has occurred during web site deployment.
call :exitSetErrorLevel
call :exitFromFunction 2>nul

:exitSetErrorLevel
exit /b 1

:exitFromFunction
()

:end
endlocal
echo Finished successfully.
"#;

const BASH_HEADER: &str = r#"#!/bin/bash

# ----------------------
# KUDU Deployment Script
# ----------------------

# Helpers
# -------

exitWithMessageOnError () {
  if [ ! $? -eq 0 ]; then
    echo "An error has occurred during web site deployment."
    echo $1
    exit 1
  fi
}

# Setup
# -----

SCRIPT_DIR="${BASH_SOURCE[0]%\\*}"
SCRIPT_DIR="${SCRIPT_DIR%/*}"
ARTIFACTS=$SCRIPT_DIR/../artifacts

if [[ ! -n "$DEPLOYMENT_SOURCE" ]]; then
  DEPLOYMENT_SOURCE=$SCRIPT_DIR
fi

if [[ ! -n "$NEXT_MANIFEST_PATH" ]]; then
  NEXT_MANIFEST_PATH=$ARTIFACTS/manifest

  if [[ ! -n "$PREVIOUS_MANIFEST_PATH" ]]; then
    PREVIOUS_MANIFEST_PATH=$NEXT_MANIFEST_PATH
  fi
fi

if [[ ! -n "$DEPLOYMENT_TARGET" ]]; then
  DEPLOYMENT_TARGET=$ARTIFACTS/wwwroot
fi

if [[ ! -n "$KUDU_SYNC_CMD" ]]; then
  # Install kudu sync
  echo Installing Kudu Sync
  npm install kudusync -g --silent
  exitWithMessageOnError "npm failed"
  KUDU_SYNC_CMD=kuduSync
fi
"#;

const BASH_FOOTER: &str = r#"
echo "Finished successfully."
"#;

/// Full script text for a project kind.
pub(super) fn render(kind: &ProjectKind, script_type: ScriptType, solution: Option<&str>) -> String {
    let mut script = String::new();
    script.push_str(match script_type {
        ScriptType::Batch => BATCH_HEADER,
        ScriptType::Bash => BASH_HEADER,
    });
    script.push_str(&section_title(script_type, "Deployment"));
    let _ = writeln!(script, "echo {}\n", kind.handling_message());
    match script_type {
        ScriptType::Batch => render_batch_steps(&mut script, kind, solution),
        ScriptType::Bash => render_bash_steps(&mut script, kind, solution),
    }
    script.push_str(match script_type {
        ScriptType::Batch => BATCH_FOOTER,
        ScriptType::Bash => BASH_FOOTER,
    });
    script
}

fn section_title(script_type: ScriptType, title: &str) -> String {
    let marker = match script_type {
        ScriptType::Batch => "::",
        ScriptType::Bash => "#",
    };
    format!(
        "\n{marker} {title}\n{marker} {}\n\n",
        "-".repeat(title.len())
    )
}

fn batch_sync(source: &str) -> String {
    format!(
        r#"IF /I "%IN_PLACE_DEPLOYMENT%" NEQ "1" (
  call :ExecuteCmd "%KUDU_SYNC_CMD%" -v 50 -f "{source}" -t "%DEPLOYMENT_TARGET%" -n "%NEXT_MANIFEST_PATH%" -p "%PREVIOUS_MANIFEST_PATH%" -i ".git;.hg;.deployment;deploy.cmd"
  IF !ERRORLEVEL! NEQ 0 goto error
)
"#
    )
}

fn bash_sync(source: &str) -> String {
    format!(
        r#"if [[ "$IN_PLACE_DEPLOYMENT" -ne "1" ]]; then
  "$KUDU_SYNC_CMD" -v 50 -f "{source}" -t "$DEPLOYMENT_TARGET" -n "$NEXT_MANIFEST_PATH" -p "$PREVIOUS_MANIFEST_PATH" -i ".git;.hg;.deployment;deploy.sh"
  exitWithMessageOnError "Kudu Sync failed"
fi
"#
    )
}

fn render_batch_steps(script: &mut String, kind: &ProjectKind, solution: Option<&str>) {
    if let Some(solution) = solution {
        let _ = writeln!(
            script,
            ":: Restore NuGet packages\ncall :ExecuteCmd nuget restore \"%DEPLOYMENT_SOURCE%\\{solution}\"\nIF !ERRORLEVEL! NEQ 0 goto error\n"
        );
    }
    match kind {
        ProjectKind::AspWap { project_file } => {
            let _ = writeln!(
                script,
                ":: Build to the temporary path\ncall :ExecuteCmd \"%MSBUILD_PATH%\" \"%DEPLOYMENT_SOURCE%\\{project_file}\" /nologo /verbosity:m /t:Build /t:pipelinePreDeployCopyAllFilesToOneFolder /p:_PackageTempDir=\"%DEPLOYMENT_TEMP%\";AutoParameterizationWebConfigConnectionStrings=false;Configuration=Release\nIF !ERRORLEVEL! NEQ 0 goto error\n"
            );
            script.push_str(&batch_sync("%DEPLOYMENT_TEMP%"));
        }
        ProjectKind::Node => {
            script.push_str(&batch_sync("%DEPLOYMENT_SOURCE%"));
            script.push_str(
                "\n:: Install npm packages\nIF EXIST \"%DEPLOYMENT_TARGET%\\package.json\" (\n  pushd \"%DEPLOYMENT_TARGET%\"\n  call :ExecuteCmd npm install --production\n  IF !ERRORLEVEL! NEQ 0 goto error\n  popd\n)\n",
            );
        }
        ProjectKind::Python => {
            script.push_str(&batch_sync("%DEPLOYMENT_SOURCE%"));
            script.push_str(
                "\n:: Install python packages\nIF EXIST \"%DEPLOYMENT_TARGET%\\requirements.txt\" (\n  pushd \"%DEPLOYMENT_TARGET%\"\n  call :ExecuteCmd env\\scripts\\pip install -r requirements.txt\n  IF !ERRORLEVEL! NEQ 0 goto error\n  popd\n)\n",
            );
        }
        ProjectKind::Basic | ProjectKind::Php | ProjectKind::AspWebSite => {
            script.push_str(&batch_sync("%DEPLOYMENT_SOURCE%"));
        }
    }
}

fn render_bash_steps(script: &mut String, kind: &ProjectKind, solution: Option<&str>) {
    if let Some(solution) = solution {
        let _ = writeln!(
            script,
            "# Restore NuGet packages\nnuget restore \"$DEPLOYMENT_SOURCE/{solution}\"\nexitWithMessageOnError \"nuget restore failed\"\n"
        );
    }
    match kind {
        ProjectKind::AspWap { project_file } => {
            let _ = writeln!(
                script,
                "# Build to the temporary path\nxbuild \"$DEPLOYMENT_SOURCE/{project_file}\" /nologo /verbosity:m /t:Build /p:Configuration=Release\nexitWithMessageOnError \"Build failed\"\n"
            );
            script.push_str(&bash_sync("$DEPLOYMENT_TEMP"));
        }
        ProjectKind::Node => {
            script.push_str(&bash_sync("$DEPLOYMENT_SOURCE"));
            script.push_str(
                "\n# Install npm packages\nif [ -e \"$DEPLOYMENT_TARGET/package.json\" ]; then\n  cd \"$DEPLOYMENT_TARGET\"\n  npm install --production\n  exitWithMessageOnError \"npm failed\"\n  cd - > /dev/null\nfi\n",
            );
        }
        ProjectKind::Python => {
            script.push_str(&bash_sync("$DEPLOYMENT_SOURCE"));
            script.push_str(
                "\n# Install python packages\nif [ -e \"$DEPLOYMENT_TARGET/requirements.txt\" ]; then\n  cd \"$DEPLOYMENT_TARGET\"\n  pip install -r requirements.txt\n  exitWithMessageOnError \"pip failed\"\n  cd - > /dev/null\nfi\n",
            );
        }
        ProjectKind::Basic | ProjectKind::Php | ProjectKind::AspWebSite => {
            script.push_str(&bash_sync("$DEPLOYMENT_SOURCE"));
        }
    }
}
